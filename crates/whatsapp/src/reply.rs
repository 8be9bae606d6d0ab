//! Auto-reply policies applied to inbound messages.

use zahra_config::ReplyConfig;

use crate::message::InboundEvent;

/// Decides whether (and what) to answer an inbound message.
pub trait ReplyPolicy: Send + Sync {
    fn reply(&self, event: &InboundEvent) -> Option<String>;
}

/// Never replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReply;

impl ReplyPolicy for NoReply {
    fn reply(&self, _event: &InboundEvent) -> Option<String> {
        None
    }
}

/// Whole-body trigger match with canned responses. First matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct ExactMatchPolicy {
    rules: Vec<(String, String)>,
    case_sensitive: bool,
}

impl ExactMatchPolicy {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            rules: Vec::new(),
            case_sensitive,
        }
    }

    pub fn from_config(cfg: &ReplyConfig) -> Self {
        cfg.rules
            .iter()
            .fold(Self::new(cfg.case_sensitive), |policy, rule| {
                policy.rule(&rule.trigger, &rule.response)
            })
    }

    pub fn rule(mut self, trigger: &str, response: &str) -> Self {
        let trigger = self.fold_case(trigger);
        self.rules.push((trigger, response.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn fold_case(&self, text: &str) -> String {
        if self.case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        }
    }
}

impl ReplyPolicy for ExactMatchPolicy {
    fn reply(&self, event: &InboundEvent) -> Option<String> {
        let body = self.fold_case(&event.body);
        self.rules
            .iter()
            .find(|(trigger, _)| *trigger == body)
            .map(|(_, response)| response.clone())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, chrono::Utc};

    fn inbound(body: &str) -> InboundEvent {
        InboundEvent {
            sender: "62811@s.whatsapp.net".into(),
            body: body.into(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn default_config_answers_halo() {
        let policy = ExactMatchPolicy::from_config(&ReplyConfig::default());
        assert_eq!(
            policy.reply(&inbound("HaLo")).as_deref(),
            Some("Halo juga dari ZahraBot! 👋")
        );
        assert_eq!(policy.reply(&inbound("halo bot")), None);
        assert_eq!(policy.reply(&inbound(" halo")), None);
    }

    #[test]
    fn case_sensitive_rules() {
        let policy = ExactMatchPolicy::new(true).rule("Ping", "pong");
        assert_eq!(policy.reply(&inbound("Ping")).as_deref(), Some("pong"));
        assert_eq!(policy.reply(&inbound("ping")), None);
    }

    #[test]
    fn first_rule_wins() {
        let policy = ExactMatchPolicy::new(false)
            .rule("hi", "first")
            .rule("HI", "second");
        assert_eq!(policy.reply(&inbound("hi")).as_deref(), Some("first"));
    }

    #[test]
    fn no_reply_is_silent() {
        assert_eq!(NoReply.reply(&inbound("halo")), None);
    }
}
