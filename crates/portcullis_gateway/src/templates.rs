//! Member-facing message text.
//!
//! Guilds can override the welcome and goodbye notices with templates such
//! as `"Welcome {membermention}, you are our {ordmembercount} member!"`.
//! Placeholders are `{name}`; `{{` and `}}` produce literal braces and any
//! unknown name renders as `<BAD_VARIABLE>`.

use crate::config::EmojiSpec;
use portcullis_core::{GuildId, GuildInfo, MemberInfo, UserId};

/// Left-to-right mark written before every member-facing notice so that
/// leading mentions or emoji do not flip the paragraph direction.
pub const LRM: char = '\u{200E}';

/// Rendered in place of an unknown placeholder.
pub const BAD_VARIABLE: &str = "<BAD_VARIABLE>";

/// Values available to a template.
#[derive(Debug, Clone)]
pub struct TemplateVars<'a> {
    member: &'a MemberInfo,
    guild: &'a GuildInfo,
}

impl<'a> TemplateVars<'a> {
    /// Variables describing `member` in `guild`.
    pub fn new(member: &'a MemberInfo, guild: &'a GuildInfo) -> Self {
        Self { member, guild }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let m = self.member;
        let g = self.guild;
        let value = match key {
            "membername" | "username" => m.name.clone(),
            "membermention" | "usermention" => m.user_id.mention(),
            "memberstr" | "userstr" => m.name.clone(),
            "memberid" | "userid" => m.user_id.to_string(),
            "servername" | "guildname" => g.name.clone(),
            "serverid" | "guildid" => g.id.to_string(),
            "membercount" => group_thousands(g.member_count),
            "ordmembercount" => ordinal(g.member_count),
            "humancount" => group_thousands(g.human_count()),
            "ordhumancount" => ordinal(g.human_count()),
            "botcount" => group_thousands(g.bot_count),
            "ordbotcount" => ordinal(g.bot_count),
            _ => return None,
        };
        Some(value)
    }
}

/// Substitute placeholders in `template`.
pub fn render(template: &str, vars: &TemplateVars<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                let mut closed = false;
                for k in chars.by_ref() {
                    if k == '}' {
                        closed = true;
                        break;
                    }
                    key.push(k);
                }
                if closed {
                    out.push_str(&vars.lookup(key.trim()).unwrap_or_else(|| BAD_VARIABLE.into()));
                } else {
                    out.push('{');
                    out.push_str(&key);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Whether every placeholder in `template` is known.
pub fn validate(template: &str) -> Result<(), String> {
    let probe_member = MemberInfo {
        user_id: UserId(0),
        name: String::new(),
        display_name: String::new(),
        bot: false,
        joined_at: None,
        roles: Vec::new(),
    };
    let probe_guild = GuildInfo {
        id: GuildId(0),
        name: String::new(),
        member_count: 0,
        bot_count: 0,
    };
    let rendered = render(template, &TemplateVars::new(&probe_member, &probe_guild));
    if rendered.contains(BAD_VARIABLE) {
        Err("the text contains an unknown {placeholder}".to_string())
    } else {
        Ok(())
    }
}

fn decorate(text: String) -> String {
    format!("{LRM}{text}")
}

fn notice(custom: Option<&str>, vars: &TemplateVars<'_>, default: impl FnOnce() -> String) -> String {
    decorate(match custom {
        Some(t) => render(t, vars),
        None => default(),
    })
}

/// Sent to the welcome channel when a member accepts the rules.
pub fn welcome(custom: Option<&str>, vars: &TemplateVars<'_>) -> String {
    notice(custom, vars, || {
        format!(
            "{} joined the server and accepted the rules. Welcome!",
            vars.member.user_id.mention()
        )
    })
}

/// Sent to the goodbye channel when a member leaves.
pub fn goodbye(custom: Option<&str>, vars: &TemplateVars<'_>) -> String {
    notice(custom, vars, || {
        format!("{} is no longer in the server.", vars.member.display_name)
    })
}

/// Sent to the welcome channel when a bot is added.
pub fn welcome_bot(custom: Option<&str>, vars: &TemplateVars<'_>) -> String {
    notice(custom, vars, || {
        format!("The bot {} was added to the server.", vars.member.user_id.mention())
    })
}

/// Sent to the goodbye channel when a bot is removed.
pub fn goodbye_bot(custom: Option<&str>, vars: &TemplateVars<'_>) -> String {
    notice(custom, vars, || {
        format!(
            "The bot \"{}\" was removed from the server.",
            vars.member.display_name
        )
    })
}

/// Content of the gate message.
pub fn gate(custom: Option<&str>, accept: &EmojiSpec, decline: &EmojiSpec) -> String {
    match custom {
        Some(t) => t.to_string(),
        None => format!(
            "**Attention:** Do you accept the rules outlined above? If you do, select {}, otherwise select {}.",
            accept.mention(),
            decline.mention()
        ),
    }
}

/// Operator notice sent after a trip.
pub fn trip(reason: &str) -> String {
    format!(
        "The gateway module tripped because {reason}. You will need to fix the problem and re-activate the module to use it again."
    )
}

/// `1234` as `"1,234"`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `1234` as `"1,234th"`.
pub fn ordinal(n: u64) -> String {
    let suffix = match (n % 100, n % 10) {
        (11..=13, _) => "th",
        (_, 1) => "st",
        (_, 2) => "nd",
        (_, 3) => "rd",
        _ => "th",
    };
    format!("{}{suffix}", group_thousands(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> (MemberInfo, GuildInfo) {
        (
            MemberInfo {
                user_id: UserId(42),
                name: "ada".into(),
                display_name: "Ada".into(),
                bot: false,
                joined_at: None,
                roles: vec![],
            },
            GuildInfo {
                id: GuildId(7),
                name: "Lovelace Hall".into(),
                member_count: 1_021,
                bot_count: 20,
            },
        )
    }

    #[test]
    fn placeholders_and_aliases_render() {
        let (m, g) = fixtures();
        let vars = TemplateVars::new(&m, &g);
        assert_eq!(
            render("{membermention} is {guildname}'s {ordmembercount}", &vars),
            "<@42> is Lovelace Hall's 1,021st"
        );
        assert_eq!(render("{humancount}/{botcount}", &vars), "1,001/20");
    }

    #[test]
    fn unknown_placeholder_is_marked() {
        let (m, g) = fixtures();
        let vars = TemplateVars::new(&m, &g);
        assert_eq!(render("hi {nope}", &vars), "hi <BAD_VARIABLE>");
        assert!(validate("hi {nope}").is_err());
        assert!(validate("hi {membername}").is_ok());
    }

    #[test]
    fn braces_escape_and_unclosed_pass_through() {
        let (m, g) = fixtures();
        let vars = TemplateVars::new(&m, &g);
        assert_eq!(render("{{literal}} {membername", &vars), "{literal} {membername");
    }

    #[test]
    fn notices_carry_direction_mark() {
        let (m, g) = fixtures();
        let vars = TemplateVars::new(&m, &g);
        let text = welcome(None, &vars);
        assert!(text.starts_with(LRM));
        assert!(text.ends_with("joined the server and accepted the rules. Welcome!"));
        assert_eq!(
            goodbye(Some("bye {membername}"), &vars),
            format!("{LRM}bye ada")
        );
        assert_eq!(
            goodbye_bot(None, &vars),
            format!("{LRM}The bot \"Ada\" was removed from the server.")
        );
    }

    #[test]
    fn ordinals() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(112), "112th");
        assert_eq!(ordinal(1_000_001), "1,000,001st");
        assert_eq!(group_thousands(999), "999");
    }
}
