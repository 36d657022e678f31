//! League franchise codes
//!
//! One table of team codes keyed by the seasons each code was in use.
//! Seasons are identified by their ending year (2025 = the 2024-25 season).

/// A team code and the range of seasons it was valid for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Franchise {
    pub code: &'static str,
    pub first_season: Option<u16>,
    pub last_season: Option<u16>,
}

impl Franchise {
    const fn always(code: &'static str) -> Self {
        Franchise {
            code,
            first_season: None,
            last_season: None,
        }
    }

    const fn span(code: &'static str, first: Option<u16>, last: Option<u16>) -> Self {
        Franchise {
            code,
            first_season: first,
            last_season: last,
        }
    }

    /// Whether this code was in use during `season`
    pub fn active_in(&self, season: u16) -> bool {
        self.first_season.map_or(true, |first| season >= first)
            && self.last_season.map_or(true, |last| season <= last)
    }
}

/// Every franchise code with its validity range
pub const FRANCHISES: &[Franchise] = &[
    Franchise::always("ATL"),
    Franchise::always("BOS"),
    Franchise::span("NJN", None, Some(2012)),
    Franchise::span("BRK", Some(2013), None),
    Franchise::span("CHH", Some(1989), Some(2002)),
    Franchise::span("CHA", Some(2005), Some(2014)),
    Franchise::span("CHO", Some(2015), None),
    Franchise::always("CHI"),
    Franchise::always("CLE"),
    Franchise::always("DAL"),
    Franchise::always("DEN"),
    Franchise::always("DET"),
    Franchise::always("GSW"),
    Franchise::always("HOU"),
    Franchise::always("IND"),
    Franchise::always("LAC"),
    Franchise::always("LAL"),
    Franchise::span("VAN", Some(1996), Some(2001)),
    Franchise::span("MEM", Some(2002), None),
    Franchise::span("MIA", Some(1989), None),
    Franchise::always("MIL"),
    Franchise::span("MIN", Some(1990), None),
    Franchise::span("NOH", Some(2003), Some(2005)),
    Franchise::span("NOK", Some(2006), Some(2007)),
    Franchise::span("NOH", Some(2008), Some(2013)),
    Franchise::span("NOP", Some(2014), None),
    Franchise::always("NYK"),
    Franchise::span("SEA", None, Some(2008)),
    Franchise::span("OKC", Some(2009), None),
    Franchise::span("ORL", Some(1990), None),
    Franchise::always("PHI"),
    Franchise::always("PHO"),
    Franchise::always("POR"),
    Franchise::always("SAC"),
    Franchise::always("SAS"),
    Franchise::span("TOR", Some(1996), None),
    Franchise::always("UTA"),
    Franchise::span("WSB", None, Some(1997)),
    Franchise::span("WAS", Some(1998), None),
];

/// Team codes in use for the given season, in table order
pub fn franchise_codes(season: u16) -> Vec<&'static str> {
    let mut codes: Vec<&'static str> = Vec::new();
    for franchise in FRANCHISES.iter().filter(|f| f.active_in(season)) {
        if !codes.contains(&franchise.code) {
            codes.push(franchise.code);
        }
    }
    codes
}

/// Whether `code` names a franchise in any era
pub fn is_known_code(code: &str) -> bool {
    FRANCHISES.iter().any(|f| f.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modern_league_has_thirty_teams() {
        let codes = franchise_codes(2025);
        assert_eq!(codes.len(), 30);
        assert!(codes.contains(&"BRK"));
        assert!(codes.contains(&"NOP"));
        assert!(codes.contains(&"CHO"));
        assert!(!codes.contains(&"NJN"));
        assert!(!codes.contains(&"CHA"));
    }

    #[test]
    fn test_renames_follow_season() {
        let codes = franchise_codes(2010);
        assert_eq!(codes.len(), 30);
        assert!(codes.contains(&"NJN"));
        assert!(codes.contains(&"NOH"));
        assert!(codes.contains(&"CHA"));
        assert!(codes.contains(&"OKC"));

        let codes = franchise_codes(2008);
        assert!(codes.contains(&"SEA"));
        assert!(!codes.contains(&"OKC"));
    }

    #[test]
    fn test_no_charlotte_between_hornets_and_bobcats() {
        let codes = franchise_codes(2004);
        assert_eq!(codes.len(), 29);
        assert!(!codes.iter().any(|c| c.starts_with("CH") && *c != "CHI"));
    }

    #[test]
    fn test_expansion_teams_join_in_their_first_season() {
        let codes = franchise_codes(1995);
        assert_eq!(codes.len(), 27);
        assert!(!codes.contains(&"TOR"));
        assert!(!codes.contains(&"VAN"));
        assert!(franchise_codes(1996).contains(&"TOR"));
        assert!(franchise_codes(1996).contains(&"VAN"));

        let codes = franchise_codes(1989);
        assert_eq!(codes.len(), 25);
        assert!(codes.contains(&"MIA"));
        assert!(codes.contains(&"CHH"));
        assert!(!codes.contains(&"MIN"));
        assert!(!codes.contains(&"ORL"));

        let codes = franchise_codes(1988);
        assert!(!codes.contains(&"MIA"));
        assert!(!codes.contains(&"CHH"));
    }

    #[test]
    fn test_known_codes_span_eras() {
        assert!(is_known_code("NJN"));
        assert!(is_known_code("BRK"));
        assert!(!is_known_code("XYZ"));
    }
}
