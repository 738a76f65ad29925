//! Command-line interface definitions using clap

use crate::config::DatasetKind;
use crate::domain::value_objects::{Combinator, Criteria, Predicate, QueryValue, IP_COLUMN};
use clap::Parser;

/// Resolve a country, postal code, place name or IP address to a location
#[derive(Parser, Debug)]
#[command(name = "geolookup")]
#[command(version)]
#[command(about = "Resolve partial geographic identifiers to locations", long_about = None)]
pub struct Cli {
    /// Dataset to query: country, zip or ip
    pub dataset: DatasetKind,

    /// Query terms as column=value; a bare value matches any column
    /// (for the ip dataset, the address)
    #[arg(required = true, num_args = 1..)]
    pub terms: Vec<String>,

    /// Join terms with OR instead of AND
    #[arg(long)]
    pub or: bool,

    /// Rebuild the store from its snapshot before querying
    #[arg(long)]
    pub rebuild: bool,
}

impl Cli {
    /// Criteria described by the query terms.
    pub fn criteria(&self) -> anyhow::Result<Criteria> {
        let predicates = self
            .terms
            .iter()
            .map(|term| parse_term(term, self.dataset))
            .collect();
        let combinator = if self.or { Combinator::Or } else { Combinator::And };
        Ok(Criteria::from_predicates(predicates)?.with_combinator(combinator))
    }
}

fn parse_term(term: &str, dataset: DatasetKind) -> Predicate {
    match term.split_once('=') {
        Some((column, value)) => Predicate {
            column: Some(column.trim().to_string()),
            value: QueryValue::from(value.trim()),
        },
        None if dataset == DatasetKind::Ip => Predicate {
            column: Some(IP_COLUMN.to_string()),
            value: QueryValue::from(term.trim()),
        },
        None => Predicate {
            column: None,
            value: QueryValue::from(term.trim()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qualified_terms() {
        let cli = Cli::parse_from(["geolookup", "zip", "place_name=MADRID", "country_code=ES"]);
        let criteria = cli.criteria().unwrap();

        assert_eq!(cli.dataset, DatasetKind::Zip);
        assert_eq!(criteria.predicates().len(), 2);
        assert_eq!(criteria.predicates()[0].column.as_deref(), Some("place_name"));
        assert_eq!(criteria.combinator(), Combinator::And);
    }

    #[test]
    fn test_bare_term_is_unqualified() {
        let cli = Cli::parse_from(["geolookup", "zip", "MADRID"]);
        let criteria = cli.criteria().unwrap();
        assert_eq!(criteria.single().unwrap().column, None);
    }

    #[test]
    fn test_bare_term_on_ip_dataset_is_address() {
        let cli = Cli::parse_from(["geolookup", "ip", "8.8.8.8"]);
        assert_eq!(cli.criteria().unwrap(), Criteria::ip("8.8.8.8"));
    }

    #[test]
    fn test_or_flag() {
        let cli = Cli::parse_from(["geolookup", "country", "country_code=MX", "country_code=ES", "--or"]);
        assert_eq!(cli.criteria().unwrap().combinator(), Combinator::Or);
    }

    #[test]
    fn test_terms_required() {
        assert!(Cli::try_parse_from(["geolookup", "country"]).is_err());
        assert!(Cli::try_parse_from(["geolookup", "city", "x"]).is_err());
    }
}
