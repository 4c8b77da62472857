use crate::error::ConfigError;

/// Authentication URL template, validated once at authority construction.
///
/// The template must carry exactly one `%s` slot; rendering substitutes the
/// token string into it.
#[derive(Debug, Clone)]
pub struct UrlTemplate {
    prefix: String,
    suffix: String,
}

impl UrlTemplate {
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        if template.is_empty() {
            return Err(ConfigError::EmptyUrlTemplate);
        }

        let Some(slot) = template.find("%s") else {
            return Err(ConfigError::MissingTokenSlot);
        };

        let prefix = &template[..slot];
        let suffix = &template[slot + 2..];
        if suffix.contains("%s") {
            return Err(ConfigError::ExtraTokenSlot);
        }

        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    pub fn render(&self, token: &str) -> String {
        format!("{}{}{}", self.prefix, token, self.suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_the_token_slot() {
        let template = UrlTemplate::parse("https://idp.example.net/auth?token=%s").unwrap();

        assert_eq!(
            template.render("T1"),
            "https://idp.example.net/auth?token=T1"
        );
    }

    #[test]
    fn slot_may_sit_mid_template() {
        let template = UrlTemplate::parse("https://idp/%s/callback").unwrap();

        assert_eq!(template.render("abc"), "https://idp/abc/callback");
    }

    #[test]
    fn rejects_empty_template() {
        assert_eq!(
            UrlTemplate::parse("").unwrap_err(),
            ConfigError::EmptyUrlTemplate
        );
    }

    #[test]
    fn rejects_template_without_slot() {
        assert_eq!(
            UrlTemplate::parse("https://idp/auth").unwrap_err(),
            ConfigError::MissingTokenSlot
        );
    }

    #[test]
    fn rejects_template_with_two_slots() {
        assert_eq!(
            UrlTemplate::parse("https://idp/%s/%s").unwrap_err(),
            ConfigError::ExtraTokenSlot
        );
    }
}
