//! Build-time value macros.
//!
//! A macro occupies the whole value:
//!
//! | Macro | Result |
//! |-------|--------|
//! | `{ENV:VAR}` | value of `VAR`, error when unset |
//! | `{ENV:VAR:default}` | value of `VAR`, or `default` |
//! | `{LEI:VAR}` / `{LEI:VAR:default}` | as `ENV`, and the value must be a valid LEI |
//! | `{NOW_ISO}` | run timestamp, `YYYY-MM-DDThh:mm:ssZ` |
//!
//! Anything else is a literal.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::RunContext;
use crate::error::BuildError;
use crate::models::Lei;

static VAR_MACRO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\{(ENV|LEI):([A-Za-z_][A-Za-z0-9_]*)(?::(.*))?\}$").expect("valid macro pattern")
});

/// A parsed macro-bearing value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Macro<'a> {
    Env {
        var: &'a str,
        default: Option<&'a str>,
    },
    Lei {
        var: &'a str,
        default: Option<&'a str>,
    },
    NowIso,
    Literal(&'a str),
}

impl<'a> Macro<'a> {
    pub fn parse(value: &'a str) -> Self {
        if value == "{NOW_ISO}" {
            return Macro::NowIso;
        }
        let Some(caps) = VAR_MACRO.captures(value) else {
            return Macro::Literal(value);
        };
        let (Some(kind), Some(var)) = (caps.get(1), caps.get(2)) else {
            return Macro::Literal(value);
        };
        let var = var.as_str();
        let default = caps.get(3).map(|m| m.as_str());
        match kind.as_str() {
            "LEI" => Macro::Lei { var, default },
            _ => Macro::Env { var, default },
        }
    }

    /// Name of the referenced environment variable, if any.
    pub fn variable(&self) -> Option<&'a str> {
        match self {
            Macro::Env { var, .. } | Macro::Lei { var, .. } => Some(*var),
            _ => None,
        }
    }
}

/// Resolve a value against the run context.
pub fn resolve(value: &str, ctx: &RunContext) -> Result<String, BuildError> {
    match Macro::parse(value) {
        Macro::Literal(text) => Ok(text.to_string()),
        Macro::NowIso => Ok(ctx.now_iso()),
        Macro::Env { var, default } => lookup(var, default, ctx),
        Macro::Lei { var, default } => {
            let resolved = lookup(var, default, ctx)?;
            check_lei(var, resolved)
        }
    }
}

/// Resolve a value that must be an LEI whatever macro it uses.
///
/// `label` names the value in errors when it is not an environment
/// reference.
pub fn resolve_lei(label: &str, value: &str, ctx: &RunContext) -> Result<String, BuildError> {
    let name = Macro::parse(value).variable().unwrap_or(label).to_string();
    let resolved = resolve(value, ctx)?;
    check_lei(&name, resolved)
}

fn lookup(var: &str, default: Option<&str>, ctx: &RunContext) -> Result<String, BuildError> {
    ctx.var(var)
        .or(default)
        .map(str::to_string)
        .ok_or_else(|| BuildError::MissingEnvironment(var.to_string()))
}

fn check_lei(name: &str, value: String) -> Result<String, BuildError> {
    match Lei::parse(&value) {
        Ok(_) => Ok(value),
        Err(source) => Err(BuildError::InvalidIdentifier {
            name: name.to_string(),
            value,
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(
            Macro::parse("{ENV:FIRM_LEI}"),
            Macro::Env { var: "FIRM_LEI", default: None }
        );
        assert_eq!(
            Macro::parse("{ENV:COUNTRY:FR}"),
            Macro::Env { var: "COUNTRY", default: Some("FR") }
        );
        assert_eq!(
            Macro::parse("{LEI:TO_LEI}"),
            Macro::Lei { var: "TO_LEI", default: None }
        );
        assert_eq!(Macro::parse("{NOW_ISO}"), Macro::NowIso);
        assert_eq!(Macro::parse("NORE"), Macro::Literal("NORE"));
        assert_eq!(Macro::parse("{ENV:}"), Macro::Literal("{ENV:}"));
        assert_eq!(Macro::parse("x {ENV:A}"), Macro::Literal("x {ENV:A}"));
    }

    #[test]
    fn test_resolve_env() {
        let ctx = RunContext::default().with_var("SITE", "Paris");
        assert_eq!(resolve("{ENV:SITE}", &ctx).unwrap(), "Paris");
        assert_eq!(resolve("{ENV:OTHER:fallback}", &ctx).unwrap(), "fallback");
        assert_eq!(resolve("{ENV:OTHER:}", &ctx).unwrap(), "");
        assert_eq!(resolve("plain", &ctx).unwrap(), "plain");
        assert_eq!(resolve("{NOW_ISO}", &ctx).unwrap(), "1970-01-01T00:00:00Z");

        let err = resolve("{ENV:OTHER}", &ctx).unwrap_err();
        assert!(matches!(err, BuildError::MissingEnvironment(ref v) if v == "OTHER"));
    }

    #[test]
    fn test_resolve_lei_macro() {
        let ctx = RunContext::default()
            .with_var("FIRM_LEI", "5493001KJTIIGC8Y1R12")
            .with_var("TO_LEI", "INVALID");

        assert_eq!(resolve("{LEI:FIRM_LEI}", &ctx).unwrap(), "5493001KJTIIGC8Y1R12");
        let err = resolve("{LEI:TO_LEI}", &ctx).unwrap_err();
        assert!(matches!(err, BuildError::InvalidIdentifier { ref name, .. } if name == "TO_LEI"));
    }

    #[test]
    fn test_resolve_lei_any_form() {
        let ctx = RunContext::default().with_var("FIRM_LEI", "INVALID");

        let err = resolve_lei("envelope.from_lei", "{ENV:FIRM_LEI}", &ctx).unwrap_err();
        assert!(matches!(err, BuildError::InvalidIdentifier { ref name, .. } if name == "FIRM_LEI"));

        let err = resolve_lei("envelope.to_lei", "NOTANLEI", &ctx).unwrap_err();
        assert!(matches!(err, BuildError::InvalidIdentifier { ref name, .. } if name == "envelope.to_lei"));

        let err = resolve_lei("envelope.to_lei", "{ENV:TO_LEI}", &ctx).unwrap_err();
        assert!(matches!(err, BuildError::MissingEnvironment(ref v) if v == "TO_LEI"));

        assert_eq!(
            resolve_lei("x", "529900T8BM49AURSDO55", &ctx).unwrap(),
            "529900T8BM49AURSDO55"
        );
    }
}
