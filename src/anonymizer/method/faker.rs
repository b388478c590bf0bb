//! Faker method - generate realistic, unique fake data.

use super::{Method, MethodDefaults, RowContext, Scope};
use crate::anonymizer::config::Arguments;
use crate::db::Value;
use crate::error::{AnonymizeError, Result};
use ahash::AHashSet;
use fake::faker::address::raw::{CityName, PostCode, StateName, StreetName};
use fake::faker::company::raw::CompanyName;
use fake::faker::impls::address::CityNameGenFn;
use fake::faker::internet::raw::{FreeEmail, IPv4, SafeEmail, Username};
use fake::faker::lorem::raw::{Paragraph, Sentence, Word};
use fake::faker::name::raw::{FirstName, LastName, Name};
use fake::faker::phone_number::raw::PhoneNumber;
use fake::locales::{Data, DE_DE, EN, FR_FR, JA_JP, PT_BR, ZH_CN, ZH_TW};
use fake::Fake;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::str::FromStr;

/// Draws per generated value before giving up on uniqueness
pub const MAX_UNIQUE_ATTEMPTS: usize = 10_000;

/// Generator selected by the `formatter` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    Email,
    SafeEmail,
    FreeEmail,
    Name,
    FirstName,
    LastName,
    PhoneNumber,
    UserName,
    City,
    State,
    StreetName,
    Postcode,
    Company,
    Word,
    Sentence,
    Paragraph,
    Ipv4,
}

impl FromStr for Formatter {
    type Err = AnonymizeError;

    /// Accepts both `safeEmail` and `safe_email` spellings
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        Ok(match normalized.as_str() {
            "email" => Formatter::Email,
            "safeemail" => Formatter::SafeEmail,
            "freeemail" => Formatter::FreeEmail,
            "name" => Formatter::Name,
            "firstname" => Formatter::FirstName,
            "lastname" => Formatter::LastName,
            "phonenumber" | "phone" => Formatter::PhoneNumber,
            "username" => Formatter::UserName,
            "city" => Formatter::City,
            "state" => Formatter::State,
            "streetname" => Formatter::StreetName,
            "postcode" | "zipcode" => Formatter::Postcode,
            "company" => Formatter::Company,
            "word" => Formatter::Word,
            "sentence" => Formatter::Sentence,
            "paragraph" => Formatter::Paragraph,
            "ipv4" => Formatter::Ipv4,
            _ => {
                return Err(AnonymizeError::config(format!(
                    "unknown faker formatter '{}'",
                    s
                )))
            }
        })
    }
}

impl Formatter {
    fn generate<L: Data + CityNameGenFn + Copy>(self, locale: L, rng: &mut StdRng) -> String {
        match self {
            Formatter::Email | Formatter::SafeEmail => SafeEmail(locale).fake_with_rng(rng),
            Formatter::FreeEmail => FreeEmail(locale).fake_with_rng(rng),
            Formatter::Name => Name(locale).fake_with_rng(rng),
            Formatter::FirstName => FirstName(locale).fake_with_rng(rng),
            Formatter::LastName => LastName(locale).fake_with_rng(rng),
            Formatter::PhoneNumber => PhoneNumber(locale).fake_with_rng(rng),
            Formatter::UserName => Username(locale).fake_with_rng(rng),
            Formatter::City => CityName(locale).fake_with_rng(rng),
            Formatter::State => StateName(locale).fake_with_rng(rng),
            Formatter::StreetName => StreetName(locale).fake_with_rng(rng),
            Formatter::Postcode => PostCode(locale).fake_with_rng(rng),
            Formatter::Company => CompanyName(locale).fake_with_rng(rng),
            Formatter::Word => Word(locale).fake_with_rng(rng),
            Formatter::Sentence => Sentence(locale, 4..10).fake_with_rng(rng),
            Formatter::Paragraph => Paragraph(locale, 3..5).fake_with_rng(rng),
            Formatter::Ipv4 => IPv4(locale).fake_with_rng(rng),
        }
    }
}

/// Data locale selected by the `locale` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    En,
    FrFr,
    DeDe,
    PtBr,
    JaJp,
    ZhCn,
    ZhTw,
}

impl FromStr for Locale {
    type Err = AnonymizeError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "en" | "en_us" => Locale::En,
            "fr" | "fr_fr" => Locale::FrFr,
            "de" | "de_de" => Locale::DeDe,
            "pt_br" => Locale::PtBr,
            "ja" | "ja_jp" => Locale::JaJp,
            "zh_cn" => Locale::ZhCn,
            "zh_tw" => Locale::ZhTw,
            _ => {
                return Err(AnonymizeError::config(format!(
                    "unsupported faker locale '{}'",
                    s
                )))
            }
        })
    }
}

/// Generates values with a seeded RNG and never issues the same value twice
pub struct FakerMethod {
    label: String,
    formatter: Formatter,
    locale: Locale,
    rng: StdRng,
    issued: AHashSet<String>,
}

impl FakerMethod {
    pub fn new(formatter: Formatter, locale: Locale, seed: u64) -> Self {
        Self {
            label: format!("{:?}", formatter),
            formatter,
            locale,
            rng: StdRng::seed_from_u64(seed),
            issued: AHashSet::new(),
        }
    }

    /// Arguments: `formatter` (default `email`), `locale`, `seed`
    pub fn from_arguments(args: &Arguments, defaults: &MethodDefaults) -> Result<Self> {
        let label = args
            .get_str("formatter")?
            .unwrap_or_else(|| "email".to_string());
        let locale = match args.get_str("locale")? {
            Some(locale) => locale.parse()?,
            None => defaults.locale.parse()?,
        };
        let seed = args.get_u64("seed")?.unwrap_or(defaults.seed);

        let mut method = Self::new(label.parse()?, locale, seed);
        method.label = label;
        Ok(method)
    }

    pub fn boxed(args: &Arguments, defaults: &MethodDefaults) -> Result<Box<dyn Method>> {
        Ok(Box::new(Self::from_arguments(args, defaults)?))
    }

    fn generate(&mut self) -> String {
        let rng = &mut self.rng;
        match self.locale {
            Locale::En => self.formatter.generate(EN, rng),
            Locale::FrFr => self.formatter.generate(FR_FR, rng),
            Locale::DeDe => self.formatter.generate(DE_DE, rng),
            Locale::PtBr => self.formatter.generate(PT_BR, rng),
            Locale::JaJp => self.formatter.generate(JA_JP, rng),
            Locale::ZhCn => self.formatter.generate(ZH_CN, rng),
            Locale::ZhTw => self.formatter.generate(ZH_TW, rng),
        }
    }

    fn unique(&mut self) -> Result<String> {
        for _ in 0..MAX_UNIQUE_ATTEMPTS {
            let candidate = self.generate();
            if self.issued.insert(candidate.clone()) {
                return Ok(candidate);
            }
        }
        Err(AnonymizeError::GeneratorExhausted {
            formatter: self.label.clone(),
            attempts: MAX_UNIQUE_ATTEMPTS,
        })
    }
}

impl Method for FakerMethod {
    fn apply(&mut self, _original: Option<&Value>, _context: Option<&RowContext<'_>>) -> Result<Value> {
        self.unique().map(Value::String)
    }

    fn scope(&self) -> Scope {
        Scope::Row
    }

    fn describe(&self) -> String {
        format!("faker:{}", self.label)
    }

    fn reserve(&mut self, values: &[Value]) {
        self.issued.extend(values.iter().filter_map(Value::to_text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(yaml: &str) -> Arguments {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_formatter_spellings() {
        assert_eq!("safeEmail".parse::<Formatter>().unwrap(), Formatter::SafeEmail);
        assert_eq!("safe_email".parse::<Formatter>().unwrap(), Formatter::SafeEmail);
        assert_eq!("phoneNumber".parse::<Formatter>().unwrap(), Formatter::PhoneNumber);
        assert!("creditCardNumber".parse::<Formatter>().is_err());

        assert_eq!("en_US".parse::<Locale>().unwrap(), Locale::En);
        assert_eq!("fr-FR".parse::<Locale>().unwrap(), Locale::FrFr);
        assert!("xx_XX".parse::<Locale>().is_err());
    }

    #[test]
    fn test_defaults() {
        let method = FakerMethod::from_arguments(&Arguments::default(), &MethodDefaults::default())
            .unwrap();
        assert_eq!(method.formatter, Formatter::Email);
        assert_eq!(method.locale, Locale::En);
        assert_eq!(method.describe(), "faker:email");
    }

    #[test]
    fn test_unknown_arguments_rejected() {
        let defaults = MethodDefaults::default();
        assert!(matches!(
            FakerMethod::from_arguments(&args("{ formatter: nope }"), &defaults),
            Err(AnonymizeError::Config(_))
        ));
        assert!(matches!(
            FakerMethod::from_arguments(&args("{ locale: tlh }"), &defaults),
            Err(AnonymizeError::Config(_))
        ));
    }

    #[test]
    fn test_values_are_unique() {
        let mut method = FakerMethod::new(Formatter::SafeEmail, Locale::En, 0);
        let mut seen = AHashSet::new();
        for _ in 0..200 {
            let value = method.apply(Some(&Value::from("x")), None).unwrap();
            let email = value.as_str().unwrap().to_string();
            assert!(email.contains('@'));
            assert!(seen.insert(email));
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let run = |seed| {
            let mut method = FakerMethod::new(Formatter::Name, Locale::FrFr, seed);
            (0..20)
                .map(|_| method.apply(None, None).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
        assert_ne!(run(42), run(43));
    }

    #[test]
    fn test_seed_argument_overrides_default() {
        let defaults = MethodDefaults {
            seed: 1,
            locale: "en_US".to_string(),
        };
        let mut a = FakerMethod::from_arguments(&args("{ seed: 9 }"), &defaults).unwrap();
        let mut b = FakerMethod::new(Formatter::Email, Locale::En, 9);
        assert_eq!(a.apply(None, None).unwrap(), b.apply(None, None).unwrap());
    }

    #[test]
    fn test_reserved_values_are_skipped() {
        let first = FakerMethod::new(Formatter::SafeEmail, Locale::En, 0)
            .apply(None, None)
            .unwrap();

        let mut method = FakerMethod::new(Formatter::SafeEmail, Locale::En, 0);
        method.reserve(std::slice::from_ref(&first));
        let values: Vec<_> = (0..50).map(|_| method.apply(None, None).unwrap()).collect();
        assert!(!values.contains(&first));
    }

    #[test]
    fn test_every_locale_generates() {
        for locale in ["en_US", "fr_FR", "de_DE", "pt_BR", "ja_JP", "zh_CN", "zh_TW"] {
            let mut method = FakerMethod::new(Formatter::City, locale.parse().unwrap(), 0);
            let city = method.apply(None, None).unwrap();
            assert!(!city.as_str().unwrap().is_empty(), "{}", locale);
        }
    }

    #[test]
    fn test_small_domain_exhausts() {
        // The lorem word list is far shorter than 1000 entries
        let mut method = FakerMethod::new(Formatter::Word, Locale::En, 0);
        let result = (0..1000).try_for_each(|_| method.apply(None, None).map(|_| ()));
        match result {
            Err(AnonymizeError::GeneratorExhausted { formatter, attempts }) => {
                assert_eq!(formatter, "Word");
                assert_eq!(attempts, MAX_UNIQUE_ATTEMPTS);
            }
            other => panic!("expected exhaustion, got {:?}", other.err()),
        }
    }
}
