/// Ordered fallback list of ad units for one ad request.
///
/// Built from a `;`-separated identifier string. Segments are trimmed but
/// never filtered, so `"a;;b"` keeps an empty second unit and the display
/// index the page sees lines up with the position in the raw string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdUnitChain {
    units: Vec<String>,
    /// 0-based cursor of the unit being fetched
    call_index: usize,
    /// 1-based counter shown to the page
    display_index: usize,
}

impl AdUnitChain {
    pub fn parse(raw: &str) -> Self {
        let units = raw.split(';').map(|s| s.trim().to_string()).collect();

        Self {
            units,
            call_index: 0,
            display_index: 1,
        }
    }

    /// Unit at the cursor.
    pub fn current(&self) -> &str {
        &self.units[self.call_index]
    }

    /// Moves to the next unit. Returns `false` and leaves the cursor on the
    /// last unit when the chain is exhausted.
    pub fn advance(&mut self) -> bool {
        if self.call_index + 1 >= self.units.len() {
            return false;
        }

        self.call_index += 1;
        self.display_index += 1;
        true
    }

    pub fn reset(&mut self) {
        self.call_index = 0;
        self.display_index = 1;
    }

    pub fn call_index(&self) -> usize {
        self.call_index
    }

    pub fn display_index(&self) -> usize {
        self.display_index
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_units_in_order_and_exhausts() {
        let mut chain = AdUnitChain::parse("a;b;c");
        assert_eq!(chain.current(), "a");
        assert_eq!(chain.display_index(), 1);

        assert!(chain.advance());
        assert!(chain.advance());
        assert_eq!(chain.current(), "c");
        assert_eq!(chain.call_index(), 2);
        assert_eq!(chain.display_index(), 3);

        assert!(!chain.advance());
        // cursor stays on the last attempted unit
        assert_eq!(chain.current(), "c");
        assert_eq!(chain.display_index(), 3);
    }

    #[test]
    fn trims_but_keeps_empty_segments() {
        let chain = AdUnitChain::parse(" a ; ;b\n");
        assert_eq!(chain.units(), &["a".to_string(), "".to_string(), "b".to_string()]);
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn empty_input_is_a_single_empty_unit() {
        let mut chain = AdUnitChain::parse("");
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.current(), "");
        assert!(!chain.advance());
    }

    #[test]
    fn reset_returns_to_first_unit() {
        let mut chain = AdUnitChain::parse("x;y");
        chain.advance();
        chain.reset();
        assert_eq!(chain.current(), "x");
        assert_eq!(chain.call_index(), 0);
        assert_eq!(chain.display_index(), 1);
    }

    #[test]
    fn display_index_stays_one_ahead_of_call_index() {
        let mut chain = AdUnitChain::parse("1;2;3;4");
        loop {
            assert_eq!(chain.display_index(), chain.call_index() + 1);
            if !chain.advance() {
                break;
            }
        }
    }
}
