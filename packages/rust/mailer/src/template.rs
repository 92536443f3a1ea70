//! Subject and body templates with `{company}` / `{sender_name}` placeholders.

use outreach_shared::MailSettings;

/// Outreach message template.
#[derive(Debug, Clone)]
pub struct OutreachTemplate {
    pub sender_name: String,
    pub subject: String,
    pub body: String,
}

/// A template filled in for one company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

impl OutreachTemplate {
    pub fn render(&self, company: &str) -> RenderedEmail {
        RenderedEmail {
            subject: self.fill(&self.subject, company),
            body: self.fill(&self.body, company),
        }
    }

    fn fill(&self, text: &str, company: &str) -> String {
        text.replace("{sender_name}", &self.sender_name)
            .replace("{company}", company)
    }
}

impl From<&MailSettings> for OutreachTemplate {
    fn from(settings: &MailSettings) -> Self {
        Self {
            sender_name: settings.sender_name.clone(),
            subject: settings.subject_template.clone(),
            body: settings.body_template.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_filled() {
        let template = OutreachTemplate {
            sender_name: "Ada".into(),
            subject: "Hello {company}".into(),
            body: "I'm {sender_name}. {company} looks great; {company} again.".into(),
        };
        let rendered = template.render("Acme");
        assert_eq!(rendered.subject, "Hello Acme");
        assert_eq!(rendered.body, "I'm Ada. Acme looks great; Acme again.");
    }

    #[test]
    fn company_text_is_not_reexpanded() {
        let template = OutreachTemplate {
            sender_name: "Ada".into(),
            subject: "{company}".into(),
            body: String::new(),
        };
        assert_eq!(template.render("{sender_name}").subject, "{sender_name}");
    }

    #[test]
    fn default_settings_mention_company() {
        let settings = MailSettings::from(&outreach_shared::AppConfig::default());
        let rendered = OutreachTemplate::from(&settings).render("Globex");
        assert!(rendered.subject.contains("Globex"));
        assert!(rendered.body.contains("Globex"));
        assert!(!rendered.body.contains("{sender_name}"));
    }
}
