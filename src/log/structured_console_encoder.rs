use log::{
    Record,
    kv::{self, Key, Value, VisitSource},
};
use log4rs::encode::{Color, Encode, Style, Write, pattern::PatternEncoder};
use serde::Deserialize;

use super::{is_secret_key, mask_secret};

const DEFAULT_PATTERN: &str = "{d} {l} {t} {m}";

#[derive(Debug, Deserialize)]
pub struct StructuredConsoleEncoderConfig {
    pub pattern: Option<String>,
    /// Masks credential values (default `true`).
    pub mask_secrets: Option<bool>,
}

/// Pattern encoder that appends the record's key/value pairs as ` key=value`.
///
/// Values containing whitespace are quoted. Credential values are masked unless
/// masking is switched off or `REVEAL_SECRETS` is set.
#[derive(Debug)]
pub struct StructuredConsoleEncoder {
    delegate: PatternEncoder,
    mask_secrets: bool,
}

impl StructuredConsoleEncoder {
    pub fn new(pattern: &str) -> Self {
        Self {
            delegate: PatternEncoder::new(pattern),
            mask_secrets: true,
        }
    }

    pub fn with_secret_masking(mut self, enabled: bool) -> Self {
        self.mask_secrets = enabled;
        self
    }

    fn render(&self, key: &str, value: String) -> String {
        let value = if self.mask_secrets && is_secret_key(key) {
            mask_secret(&value)
        } else {
            value
        };

        if value.chars().any(char::is_whitespace) {
            format!("{value:?}")
        } else {
            value
        }
    }
}

impl Encode for StructuredConsoleEncoder {
    fn encode(&self, w: &mut dyn Write, record: &Record) -> anyhow::Result<()> {
        self.delegate.encode(w, record)?;

        let mut pairs = PairCollector::default();
        record.key_values().visit(&mut pairs)?;

        for (key, value) in pairs.0 {
            let value = self.render(&key, value);
            w.set_style(Style::new().text(Color::Cyan))?;
            write!(w, " {key}=")?;
            w.set_style(&Style::default())?;
            w.write_all(value.as_bytes())?;
        }

        w.write_all(b"\n")?;
        Ok(())
    }
}

#[derive(Default)]
struct PairCollector(Vec<(String, String)>);

impl<'kvs> VisitSource<'kvs> for PairCollector {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), kv::Error> {
        self.0.push((key.as_str().to_string(), value.to_string()));
        Ok(())
    }
}

pub struct StructuredConsoleEncoderDeserializer;

impl log4rs::config::Deserialize for StructuredConsoleEncoderDeserializer {
    type Trait = dyn Encode;
    type Config = StructuredConsoleEncoderConfig;

    fn deserialize(
        &self,
        config: StructuredConsoleEncoderConfig,
        _: &log4rs::config::Deserializers,
    ) -> anyhow::Result<Box<dyn Encode>> {
        let encoder = StructuredConsoleEncoder::new(config.pattern.as_deref().unwrap_or(DEFAULT_PATTERN))
            .with_secret_masking(config.mask_secrets.unwrap_or(true));
        Ok(Box::new(encoder))
    }
}
