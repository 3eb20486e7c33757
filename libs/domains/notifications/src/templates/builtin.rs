//! Templates shipped with the engine.

use super::TemplateDefinition;

pub const WELCOME: &str = "welcome";
pub const VERIFICATION: &str = "verification";
pub const PASSWORD_RESET: &str = "password_reset";
pub const NOTIFICATION: &str = "notification";
pub const PROFILE_CHANGED: &str = "profile_changed";
pub const SECURITY_ALERT: &str = "security_alert";

pub(super) fn definitions() -> Vec<TemplateDefinition> {
    vec![
        TemplateDefinition::new(WELCOME, "Welcome to {{company_name}}, {{user_name}}!", WELCOME_TEXT)
            .with_html(WELCOME_HTML)
            .require(&["user_name", "dashboard_url", "company_name"]),
        TemplateDefinition::new(VERIFICATION, "Verify your email address", VERIFICATION_TEXT)
            .with_html(VERIFICATION_HTML)
            .require(&["user_name", "action_url", "expiry_hours", "company_name"]),
        TemplateDefinition::new(PASSWORD_RESET, "Reset your {{company_name}} password", PASSWORD_RESET_TEXT)
            .with_html(PASSWORD_RESET_HTML)
            .require(&["user_name", "action_url", "expiry_hours", "company_name"]),
        TemplateDefinition::new(NOTIFICATION, "{{title}}", NOTIFICATION_TEXT)
            .with_html(NOTIFICATION_HTML)
            .require(&["user_name", "title", "message", "company_name"]),
        TemplateDefinition::new(
            PROFILE_CHANGED,
            "Your {{company_name}} profile was updated",
            PROFILE_CHANGED_TEXT,
        )
        .with_html(PROFILE_CHANGED_HTML)
        .require(&["user_name", "changed_fields", "changed_at", "company_name"]),
        TemplateDefinition::new(SECURITY_ALERT, "Security alert: {{alert_type}}", SECURITY_ALERT_TEXT)
            .with_html(SECURITY_ALERT_HTML)
            .require(&[
                "user_name",
                "alert_type",
                "occurred_at",
                "secure_account_url",
                "company_name",
            ]),
    ]
}

/// Partials shared by every HTML body.
pub(super) const LAYOUT_HEADER: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="margin: 0; padding: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background-color: #f4f4f5;">
  <table width="100%" cellspacing="0" cellpadding="0" style="max-width: 600px; margin: 0 auto; padding: 40px 20px;">
    {{#if logo_url}}
    <tr>
      <td style="text-align: center; padding-bottom: 24px;">
        <img src="{{logo_url}}" alt="{{company_name}}" style="height: 40px;">
      </td>
    </tr>
    {{/if}}
    <tr>
      <td style="background-color: #ffffff; border-radius: 8px; padding: 40px;">"#;

pub(super) const LAYOUT_FOOTER: &str = r#"      </td>
    </tr>
    <tr>
      <td style="padding: 24px 0; text-align: center; color: #a1a1aa; font-size: 11px;">
        {{company_name}}{{#if company_address}} | {{company_address}}{{/if}}
      </td>
    </tr>
  </table>
</body>
</html>"#;

const WELCOME_TEXT: &str = r#"Welcome aboard, {{user_name}}!

Your {{company_name}} account is ready.
{{#if verification_url}}

Please confirm your email address within {{verification_expiry_hours}} hours:
{{verification_url}}
{{/if}}

Open your dashboard: {{dashboard_url}}
{{#if help_url}}
Need help? {{help_url}}
{{/if}}

{{company_name}}"#;

const WELCOME_HTML: &str = concat!(
    "{{> layout_header}}\n",
    r#"        <h1 style="color: #18181b; font-size: 24px; margin: 0 0 16px 0;">Welcome aboard, {{user_name}}!</h1>
        <p style="color: #52525b; font-size: 16px;">Your {{company_name}} account is ready.</p>
        {{#if verification_url}}
        <p style="color: #52525b; font-size: 16px;">Please confirm your email address within {{verification_expiry_hours}} hours.</p>
        <p><a href="{{verification_url}}" style="display: inline-block; background-color: #18181b; color: #ffffff; font-size: 16px; padding: 12px 32px; text-decoration: none; border-radius: 6px;">Verify email</a></p>
        {{/if}}
        <p><a href="{{dashboard_url}}" style="color: #2563eb;">Open your dashboard</a></p>
"#,
    "{{> layout_footer}}"
);

const VERIFICATION_TEXT: &str = r#"Hi {{user_name}},

Confirm your email address for {{company_name}} by opening the link below.
The link expires in {{expiry_hours}} hours.

{{action_url}}

If you did not create an account, you can ignore this message."#;

const VERIFICATION_HTML: &str = concat!(
    "{{> layout_header}}\n",
    r#"        <h1 style="color: #18181b; font-size: 24px; margin: 0 0 16px 0;">Confirm your email</h1>
        <p style="color: #52525b; font-size: 16px;">Hi {{user_name}}, confirm your email address for {{company_name}}. The link expires in {{expiry_hours}} hours.</p>
        <p><a href="{{action_url}}" style="display: inline-block; background-color: #18181b; color: #ffffff; font-size: 16px; padding: 12px 32px; text-decoration: none; border-radius: 6px;">Verify email</a></p>
        <p style="color: #71717a; font-size: 14px;">If you did not create an account, you can ignore this message.</p>
"#,
    "{{> layout_footer}}"
);

const PASSWORD_RESET_TEXT: &str = r#"Hi {{user_name}},

We received a request to reset your {{company_name}} password.
The link below expires in {{expiry_hours}} hour(s).

{{action_url}}

If you did not ask for a reset, no action is needed. Your password stays unchanged.
{{#if help_url}}
Questions? {{help_url}}
{{/if}}"#;

const PASSWORD_RESET_HTML: &str = concat!(
    "{{> layout_header}}\n",
    r#"        <h1 style="color: #18181b; font-size: 24px; margin: 0 0 16px 0;">Reset your password</h1>
        <p style="color: #52525b; font-size: 16px;">Hi {{user_name}}, we received a request to reset your {{company_name}} password. The link expires in {{expiry_hours}} hour(s).</p>
        <p><a href="{{action_url}}" style="display: inline-block; background-color: #18181b; color: #ffffff; font-size: 16px; padding: 12px 32px; text-decoration: none; border-radius: 6px;">Choose a new password</a></p>
        <p style="color: #71717a; font-size: 14px;">If you did not ask for a reset, no action is needed.</p>
"#,
    "{{> layout_footer}}"
);

const NOTIFICATION_TEXT: &str = r#"Hi {{user_name}},

{{title}}

{{message}}
{{#if action_url}}

{{#if action_label}}{{action_label}}{{else}}Open{{/if}}: {{action_url}}
{{/if}}
{{#if preferences_url}}

Manage notifications: {{preferences_url}}
{{/if}}"#;

const NOTIFICATION_HTML: &str = concat!(
    "{{> layout_header}}\n",
    r#"        <h1 style="color: #18181b; font-size: 20px; margin: 0 0 16px 0;">{{title}}</h1>
        <p style="color: #52525b; font-size: 16px;">Hi {{user_name}},</p>
        <p style="color: #52525b; font-size: 16px;">{{message}}</p>
        {{#if action_url}}
        <p><a href="{{action_url}}" style="display: inline-block; background-color: #18181b; color: #ffffff; font-size: 16px; padding: 12px 32px; text-decoration: none; border-radius: 6px;">{{#if action_label}}{{action_label}}{{else}}Open{{/if}}</a></p>
        {{/if}}
        {{#if preferences_url}}
        <p style="font-size: 12px;"><a href="{{preferences_url}}" style="color: #2563eb;">Manage notifications</a></p>
        {{/if}}
"#,
    "{{> layout_footer}}"
);

const PROFILE_CHANGED_TEXT: &str = r#"Hi {{user_name}},

The following details of your {{company_name}} profile were changed on {{changed_at}}:

{{changed_fields}}

If this was you, there is nothing else to do.
{{#if settings_url}}
Review your settings: {{settings_url}}
{{/if}}
{{#if help_url}}
Did not make this change? Contact us: {{help_url}}
{{/if}}"#;

const PROFILE_CHANGED_HTML: &str = concat!(
    "{{> layout_header}}\n",
    r#"        <h1 style="color: #18181b; font-size: 20px; margin: 0 0 16px 0;">Your profile was updated</h1>
        <p style="color: #52525b; font-size: 16px;">Hi {{user_name}}, the following details were changed on {{changed_at}}:</p>
        <p style="color: #18181b; font-size: 16px; font-weight: 600;">{{changed_fields}}</p>
        <p style="color: #52525b; font-size: 14px;">If this was you, there is nothing else to do.</p>
        {{#if settings_url}}
        <p><a href="{{settings_url}}" style="color: #2563eb;">Review your settings</a></p>
        {{/if}}
"#,
    "{{> layout_footer}}"
);

const SECURITY_ALERT_TEXT: &str = r#"Hi {{user_name}},

We noticed a security event on your {{company_name}} account.

Event: {{alert_type}}
Time: {{occurred_at}}
{{#if ip_address}}
IP address: {{ip_address}}
{{/if}}
{{#if location}}
Location: {{location}}
{{/if}}

If this was not you, secure your account now:
{{secure_account_url}}"#;

const SECURITY_ALERT_HTML: &str = concat!(
    "{{> layout_header}}\n",
    r#"        <h1 style="color: #dc2626; font-size: 20px; margin: 0 0 16px 0;">Security alert</h1>
        <p style="color: #52525b; font-size: 16px;">Hi {{user_name}}, we noticed a security event on your {{company_name}} account.</p>
        <table cellspacing="0" cellpadding="4" style="color: #18181b; font-size: 14px; margin-bottom: 24px;">
          <tr><td>Event</td><td>{{alert_type}}</td></tr>
          <tr><td>Time</td><td>{{occurred_at}}</td></tr>
          {{#if ip_address}}<tr><td>IP address</td><td>{{ip_address}}</td></tr>{{/if}}
          {{#if location}}<tr><td>Location</td><td>{{location}}</td></tr>{{/if}}
        </table>
        {{#if secure_account_url}}
        <p><a href="{{secure_account_url}}" style="display: inline-block; background-color: #dc2626; color: #ffffff; font-size: 16px; padding: 12px 32px; text-decoration: none; border-radius: 6px;">Secure my account</a></p>
        {{/if}}
"#,
    "{{> layout_footer}}"
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    /// Plain `{{name}}` references outside any block helper.
    fn unconditional_placeholders(source: &str) -> BTreeSet<String> {
        let source = source
            .replace("{{> layout_header}}", LAYOUT_HEADER)
            .replace("{{> layout_footer}}", LAYOUT_FOOTER);

        let mut found = BTreeSet::new();
        let mut depth = 0usize;
        let mut rest = source.as_str();
        while let Some(start) = rest.find("{{") {
            let Some(end) = rest[start..].find("}}") else {
                break;
            };
            let token = rest[start + 2..start + end].trim();
            rest = &rest[start + end + 2..];

            if token.starts_with('#') {
                depth += 1;
            } else if token.starts_with('/') {
                depth = depth.saturating_sub(1);
            } else if depth == 0 && token != "else" && !token.starts_with('>') {
                found.insert(token.to_string());
            }
        }
        found
    }

    #[test]
    fn test_every_builtin_has_html_and_requirements() {
        let definitions = definitions();
        assert_eq!(definitions.len(), 6);
        for definition in &definitions {
            assert!(definition.html.is_some(), "{} has no html part", definition.name);
            assert!(definition.required.iter().any(|key| key == "user_name"));
        }
    }

    #[test]
    fn test_unconditional_placeholders_are_required() {
        for definition in definitions() {
            let mut used = unconditional_placeholders(&definition.subject);
            used.extend(unconditional_placeholders(&definition.text));
            if let Some(html) = &definition.html {
                used.extend(unconditional_placeholders(html));
            }

            for key in used {
                assert!(
                    definition.required.contains(&key),
                    "{} renders {{{{{}}}}} unconditionally but does not require it",
                    definition.name,
                    key
                );
            }
        }
    }

    #[test]
    fn test_placeholder_scan_skips_conditionals() {
        let found = unconditional_placeholders("Hi {{name}}{{#if url}} {{url}}{{else}}-{{/if}} {{> layout_footer}}");
        let expected: BTreeSet<String> = ["name", "company_name"].into_iter().map(String::from).collect();
        assert_eq!(found, expected);
    }
}
