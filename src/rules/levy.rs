use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::round2;

const SDL_RATE: Decimal = dec!(0.0025);
const SDL_MIN: Decimal = dec!(2.00);
const SDL_MAX: Decimal = dec!(11.25);

/// Skills Development Levy, paid by the employer for every worker.
pub fn sdl(gross: Decimal) -> Decimal {
    if gross <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round2(gross * SDL_RATE).clamp(SDL_MIN, SDL_MAX)
}

// (upper bound of gross wages, monthly contribution)
const SINDA_BANDS: [(Decimal, Decimal); 7] = [
    (dec!(1000), dec!(1)),
    (dec!(1500), dec!(3)),
    (dec!(2500), dec!(5)),
    (dec!(4500), dec!(7)),
    (dec!(7500), dec!(9)),
    (dec!(10000), dec!(12)),
    (dec!(15000), dec!(18)),
];
const SINDA_TOP: Decimal = dec!(30);

/// SINDA fund deduction from the worker's pay.
pub fn sinda(gross: Decimal) -> Decimal {
    if gross <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    SINDA_BANDS
        .iter()
        .find(|(limit, _)| gross <= *limit)
        .map(|(_, amount)| *amount)
        .unwrap_or(SINDA_TOP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdl_is_bounded() {
        assert_eq!(sdl(Decimal::ZERO), Decimal::ZERO);
        assert_eq!(sdl(dec!(500)), dec!(2));
        assert_eq!(sdl(dec!(2000)), dec!(5));
        assert_eq!(sdl(dec!(2345.67)), dec!(5.86));
        assert_eq!(sdl(dec!(9000)), dec!(11.25));
    }

    #[test]
    fn sinda_band_edges() {
        assert_eq!(sinda(Decimal::ZERO), Decimal::ZERO);
        assert_eq!(sinda(dec!(1000)), dec!(1));
        assert_eq!(sinda(dec!(1000.01)), dec!(3));
        assert_eq!(sinda(dec!(2500)), dec!(5));
        assert_eq!(sinda(dec!(4000)), dec!(7));
        assert_eq!(sinda(dec!(15000)), dec!(18));
        assert_eq!(sinda(dec!(15000.01)), dec!(30));
    }
}
