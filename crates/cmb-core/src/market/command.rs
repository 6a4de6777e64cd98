use regex::Regex;

pub const USAGE_HINT: &str = "Please enter a valid command.\nExample: price BTC";

/// A parsed `price <SYMBOL>` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceCommand {
    /// Upper-cased ticker symbol.
    pub symbol: String,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("not a price command")]
    NotPriceCommand,
    #[error("expected exactly one symbol")]
    WrongArity,
    #[error("symbol must be letters, digits or underscores")]
    BadSymbol,
}

impl PriceCommand {
    /// True if the text addresses the price command at all (first word `price`).
    pub fn is_addressed(text: &str) -> bool {
        text.split_whitespace().next() == Some("price")
    }

    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let mut words = text.split_whitespace();
        if words.next() != Some("price") {
            return Err(CommandError::NotPriceCommand);
        }
        let (Some(symbol), None) = (words.next(), words.next()) else {
            return Err(CommandError::WrongArity);
        };

        let symbol_re = Regex::new(r"^\w+$").expect("valid regex");
        if !symbol_re.is_match(symbol) {
            return Err(CommandError::BadSymbol);
        }

        Ok(Self {
            symbol: symbol.to_uppercase(),
        })
    }
}
