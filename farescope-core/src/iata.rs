use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A three-letter IATA location code, always stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IataCode(String);

impl IataCode {
    /// Trims and uppercases `raw`; rejects anything that is not three ASCII letters.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let code = raw.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CoreError::InvalidRequest(format!(
                "'{}' is not a valid IATA airport code",
                raw.trim()
            )));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for IataCode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<IataCode> for String {
    fn from(code: IataCode) -> Self {
        code.0
    }
}

impl fmt::Display for IataCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub code: IataCode,
    pub name: String,
    pub city: String,
    pub country: String,
}

/// In-memory airport lookup backing the suggestion endpoint.
#[derive(Debug, Clone, Default)]
pub struct AirportDirectory {
    airports: Vec<Airport>,
}

impl AirportDirectory {
    pub fn new(airports: Vec<Airport>) -> Self {
        Self { airports }
    }

    /// Suggest airports for a free-text query.
    ///
    /// Exact code matches come first, then code prefixes, then city
    /// prefixes, then airports whose name contains the query. Within a
    /// tier results are ordered by code.
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<Airport> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut ranked: Vec<(u8, &Airport)> = self
            .airports
            .iter()
            .filter_map(|airport| {
                let code = airport.code.as_str().to_lowercase();
                let tier = if code == needle {
                    0
                } else if code.starts_with(&needle) {
                    1
                } else if airport.city.to_lowercase().starts_with(&needle) {
                    2
                } else if airport.name.to_lowercase().contains(&needle) {
                    3
                } else {
                    return None;
                };
                Some((tier, airport))
            })
            .collect();

        ranked.sort_by(|(ta, a), (tb, b)| ta.cmp(tb).then_with(|| a.code.cmp(&b.code)));
        ranked.into_iter().take(limit).map(|(_, a)| a.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }

    /// A small built-in directory of major hubs, used when no external
    /// suggestion index is configured.
    pub fn builtin() -> Self {
        const AIRPORTS: &[(&str, &str, &str, &str)] = &[
            ("AMS", "Amsterdam Schiphol", "Amsterdam", "NL"),
            ("ATH", "Athens International", "Athens", "GR"),
            ("BCN", "Barcelona El Prat", "Barcelona", "ES"),
            ("BER", "Berlin Brandenburg", "Berlin", "DE"),
            ("CDG", "Paris Charles de Gaulle", "Paris", "FR"),
            ("DUB", "Dublin", "Dublin", "IE"),
            ("DXB", "Dubai International", "Dubai", "AE"),
            ("FCO", "Rome Fiumicino", "Rome", "IT"),
            ("FRA", "Frankfurt am Main", "Frankfurt", "DE"),
            ("IST", "Istanbul", "Istanbul", "TR"),
            ("JFK", "John F. Kennedy International", "New York", "US"),
            ("LAX", "Los Angeles International", "Los Angeles", "US"),
            ("LGW", "London Gatwick", "London", "GB"),
            ("LHR", "London Heathrow", "London", "GB"),
            ("LIS", "Lisbon Humberto Delgado", "Lisbon", "PT"),
            ("MAD", "Madrid Barajas", "Madrid", "ES"),
            ("MUC", "Munich", "Munich", "DE"),
            ("MXP", "Milan Malpensa", "Milan", "IT"),
            ("ORY", "Paris Orly", "Paris", "FR"),
            ("SIN", "Singapore Changi", "Singapore", "SG"),
            ("STN", "London Stansted", "London", "GB"),
            ("VIE", "Vienna International", "Vienna", "AT"),
            ("ZRH", "Zurich", "Zurich", "CH"),
        ];

        let airports = AIRPORTS
            .iter()
            .filter_map(|(code, name, city, country)| {
                IataCode::parse(code).ok().map(|code| Airport {
                    code,
                    name: name.to_string(),
                    city: city.to_string(),
                    country: country.to_string(),
                })
            })
            .collect();
        Self::new(airports)
    }
}
