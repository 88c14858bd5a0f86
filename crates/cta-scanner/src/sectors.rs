//! Sector classification and the sector-ETF map used for the sector-wind
//! enrichment.

pub const SECTOR_ETFS: &[(&str, &str)] = &[
    ("Technology", "XLK"),
    ("Communication Services", "XLC"),
    ("Consumer Discretionary", "XLY"),
    ("Financials", "XLF"),
    ("Healthcare", "XLV"),
    ("Energy", "XLE"),
    ("Consumer Staples", "XLP"),
    ("Industrials", "XLI"),
    ("Materials", "XLB"),
    ("Utilities", "XLU"),
    ("Real Estate", "XLRE"),
];

const TICKER_SECTORS: &[(&str, &str)] = &[
    // Technology
    ("AAPL", "Technology"),
    ("MSFT", "Technology"),
    ("NVDA", "Technology"),
    ("AVGO", "Technology"),
    ("AMD", "Technology"),
    ("CRM", "Technology"),
    ("ORCL", "Technology"),
    ("ADBE", "Technology"),
    ("INTC", "Technology"),
    ("QCOM", "Technology"),
    ("MU", "Technology"),
    ("NOW", "Technology"),
    ("PANW", "Technology"),
    // Communication Services
    ("GOOGL", "Communication Services"),
    ("META", "Communication Services"),
    ("NFLX", "Communication Services"),
    ("DIS", "Communication Services"),
    ("TMUS", "Communication Services"),
    // Consumer Discretionary
    ("AMZN", "Consumer Discretionary"),
    ("TSLA", "Consumer Discretionary"),
    ("HD", "Consumer Discretionary"),
    ("NKE", "Consumer Discretionary"),
    ("SBUX", "Consumer Discretionary"),
    ("MCD", "Consumer Discretionary"),
    ("LOW", "Consumer Discretionary"),
    // Financials
    ("JPM", "Financials"),
    ("BAC", "Financials"),
    ("WFC", "Financials"),
    ("GS", "Financials"),
    ("MS", "Financials"),
    ("V", "Financials"),
    ("MA", "Financials"),
    ("SCHW", "Financials"),
    ("AXP", "Financials"),
    // Healthcare
    ("UNH", "Healthcare"),
    ("JNJ", "Healthcare"),
    ("LLY", "Healthcare"),
    ("PFE", "Healthcare"),
    ("ABBV", "Healthcare"),
    ("MRK", "Healthcare"),
    ("TMO", "Healthcare"),
    ("ABT", "Healthcare"),
    // Energy
    ("XOM", "Energy"),
    ("CVX", "Energy"),
    ("COP", "Energy"),
    ("SLB", "Energy"),
    ("EOG", "Energy"),
    ("OXY", "Energy"),
    // Consumer Staples
    ("PG", "Consumer Staples"),
    ("KO", "Consumer Staples"),
    ("PEP", "Consumer Staples"),
    ("COST", "Consumer Staples"),
    ("WMT", "Consumer Staples"),
    ("TGT", "Consumer Staples"),
    // Industrials
    ("CAT", "Industrials"),
    ("DE", "Industrials"),
    ("UNP", "Industrials"),
    ("HON", "Industrials"),
    ("GE", "Industrials"),
    ("BA", "Industrials"),
    ("RTX", "Industrials"),
    ("UPS", "Industrials"),
    ("FDX", "Industrials"),
    ("LMT", "Industrials"),
    // Materials
    ("LIN", "Materials"),
    ("APD", "Materials"),
    ("SHW", "Materials"),
    ("NEM", "Materials"),
    ("FCX", "Materials"),
    ("NUE", "Materials"),
    // Utilities
    ("NEE", "Utilities"),
    ("DUK", "Utilities"),
    ("SO", "Utilities"),
    ("D", "Utilities"),
    ("AEP", "Utilities"),
    // Real Estate
    ("PLD", "Real Estate"),
    ("AMT", "Real Estate"),
    ("EQIX", "Real Estate"),
    ("SPG", "Real Estate"),
    ("O", "Real Estate"),
];

pub fn detect_sector(ticker: &str) -> &'static str {
    let upper = ticker.to_uppercase();
    TICKER_SECTORS
        .iter()
        .find(|(t, _)| *t == upper)
        .map(|(_, sector)| *sector)
        .unwrap_or("Uncategorized")
}

pub fn sector_etf(sector: &str) -> Option<&'static str> {
    SECTOR_ETFS
        .iter()
        .find(|(s, _)| *s == sector)
        .map(|(_, etf)| *etf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tickers() {
        assert_eq!(detect_sector("nvda"), "Technology");
        assert_eq!(detect_sector("JPM"), "Financials");
        assert_eq!(detect_sector("ZZZZ"), "Uncategorized");
    }

    #[test]
    fn test_every_mapped_sector_has_an_etf() {
        for (_, sector) in TICKER_SECTORS {
            assert!(sector_etf(sector).is_some(), "no ETF for {sector}");
        }
    }
}
