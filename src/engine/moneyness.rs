use crate::config::ATM_BAND_RATIO;
use crate::types::{Moneyness, OptionSide};

/// Place an option strike relative to the latest underlying future price.
///
/// An unknown (never observed, or zero) future price classifies as OTM:
/// strikes we cannot place are not worth alerting on. The ATM band is a
/// fixed fraction of the future price on either side of the strike.
pub fn classify(side: OptionSide, strike: f64, future_price: Option<f64>) -> Moneyness {
    let Some(future) = future_price.filter(|p| *p > 0.0) else {
        return Moneyness::Otm;
    };

    if (future - strike).abs() <= future * ATM_BAND_RATIO {
        return Moneyness::Atm;
    }

    let is_itm = match side {
        OptionSide::Call => strike < future,
        OptionSide::Put => strike > future,
    };
    if is_itm {
        Moneyness::Itm
    } else {
        Moneyness::Otm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_future_price_defaults_to_otm() {
        assert_eq!(classify(OptionSide::Call, 58900.0, None), Moneyness::Otm);
        assert_eq!(classify(OptionSide::Put, 58900.0, Some(0.0)), Moneyness::Otm);
    }

    #[test]
    fn atm_band_is_a_tenth_of_a_percent() {
        // Band at future 58900 is ±58.9 points.
        assert_eq!(classify(OptionSide::Call, 58900.0, Some(58900.0)), Moneyness::Atm);
        assert_eq!(classify(OptionSide::Call, 58850.0, Some(58900.0)), Moneyness::Atm);
        assert_eq!(classify(OptionSide::Put, 58950.0, Some(58900.0)), Moneyness::Atm);
        // Just outside the band.
        assert_eq!(classify(OptionSide::Call, 58840.0, Some(58900.0)), Moneyness::Itm);
        assert_eq!(classify(OptionSide::Put, 58960.0, Some(58900.0)), Moneyness::Itm);
    }

    #[test]
    fn calls_and_puts_mirror_each_other() {
        // Call below the future is ITM; put below is OTM.
        assert_eq!(classify(OptionSide::Call, 58000.0, Some(58900.0)), Moneyness::Itm);
        assert_eq!(classify(OptionSide::Put, 58000.0, Some(58900.0)), Moneyness::Otm);
        // And the inverse above.
        assert_eq!(classify(OptionSide::Call, 59800.0, Some(58900.0)), Moneyness::Otm);
        assert_eq!(classify(OptionSide::Put, 59800.0, Some(58900.0)), Moneyness::Itm);
    }
}
