//! Message catalog keys used by the application layer.

pub const SUBSCRIPTION_ACTIVATED: &str = "subscription_activated";
pub const CONNECT_BUTTON: &str = "connect_button";
pub const SUBSCRIPTION_EXPIRING: &str = "subscription_expiring";
pub const RENEW_SUBSCRIPTION_BUTTON: &str = "renew_subscription_button";
pub const REFERRAL_BONUS_GRANTED: &str = "referral_bonus_granted";
pub const INVOICE_TITLE: &str = "invoice_title";
pub const INVOICE_DESCRIPTION: &str = "invoice_description";

/// Callback data that opens the plan picker in the chat front end.
pub const BUY_CALLBACK: &str = "buy";

/// Replaces `{name}` placeholders in a catalog template.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |text, (name, value)| {
        text.replace(&format!("{{{}}}", name), value)
    })
}
