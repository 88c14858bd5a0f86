//! Canonical key names for everything persisted in the KV store.

pub const COMPOSITE_LATEST: &str = "bias:composite:latest";
pub const OVERRIDE: &str = "bias:override";
pub const CIRCUIT_BREAKER: &str = "bias:circuit_breaker";
pub const TICK_CURRENT: &str = "bias:tick:current";
pub const BREADTH_UVOL_DVOL: &str = "breadth:uvol_dvol:current";
pub const PCR_CURRENT: &str = "pcr:current";
pub const MARKET_TIDE: &str = "uw:market_tide:latest";
pub const UW_FLOW_RECENT: &str = "uw:flow:recent";
pub const UW_DISCOVERY: &str = "uw:discovery";

pub fn factor_latest(factor_id: &str) -> String {
    format!("bias:factor:{factor_id}:latest")
}

pub fn factor_history(factor_id: &str) -> String {
    format!("bias:factor:{factor_id}:history")
}

pub fn fred_snapshot(series: &str) -> String {
    format!("fred:{series}:latest")
}

pub fn price_cache(ticker: &str, days: i64) -> String {
    format!("prices:{ticker}:{days}")
}

pub fn uw_flow(ticker: &str) -> String {
    format!("uw:flow:{}", ticker.to_uppercase())
}

pub fn cta_zone(etf: &str) -> String {
    format!("cta:zone:{}", etf.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(factor_latest("vix_term"), "bias:factor:vix_term:latest");
        assert_eq!(factor_history("savita"), "bias:factor:savita:history");
        assert_eq!(fred_snapshot("T10Y2Y"), "fred:T10Y2Y:latest");
        assert_eq!(price_cache("SPY", 250), "prices:SPY:250");
        assert_eq!(uw_flow("nvda"), "uw:flow:NVDA");
        assert_eq!(cta_zone("xlk"), "cta:zone:XLK");
    }
}
