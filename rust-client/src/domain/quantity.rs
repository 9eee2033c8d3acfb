use std::{fmt, str::FromStr};

/// Weather quantity requested from the API. Also names the table it is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    Forecasts,
    EstimatedActuals,
}

impl Quantity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forecasts => "forecasts",
            Self::EstimatedActuals => "estimated_actuals",
        }
    }

    pub fn table_name(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown quantity '{0}', expected 'forecasts' or 'estimated_actuals'")]
pub struct ParseQuantityError(String);

impl FromStr for Quantity {
    type Err = ParseQuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forecasts" => Ok(Self::Forecasts),
            "estimated_actuals" => Ok(Self::EstimatedActuals),
            other => Err(ParseQuantityError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names() {
        assert_eq!("forecasts".parse::<Quantity>().unwrap(), Quantity::Forecasts);
        assert_eq!(
            "estimated_actuals".parse::<Quantity>().unwrap(),
            Quantity::EstimatedActuals
        );
        assert!("forecasts; DROP TABLE x".parse::<Quantity>().is_err());
    }
}
