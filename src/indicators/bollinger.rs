/// Bollinger Bands (SMA-based with population standard deviation)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBands {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Returns `None` if fewer than `period` prices
pub fn calculate_bollinger(prices: &[f64], period: usize, std_mult: f64) -> Option<BollingerBands> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let window = &prices[prices.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;

    let variance = window
        .iter()
        .map(|p| {
            let diff = p - middle;
            diff * diff
        })
        .sum::<f64>()
        / period as f64;

    let std_dev = variance.sqrt();

    Some(BollingerBands {
        upper: middle + std_mult * std_dev,
        middle,
        lower: middle - std_mult * std_dev,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_prices_collapse_bands() {
        let prices = vec![50.0; 20];
        let bb = calculate_bollinger(&prices, 20, 2.0).unwrap();

        assert_eq!(bb.upper, 50.0);
        assert_eq!(bb.middle, 50.0);
        assert_eq!(bb.lower, 50.0);
        assert_eq!(bb.width(), 0.0);
    }

    #[test]
    fn test_bands_are_symmetric() {
        // mean 3, population std sqrt(2)
        let prices = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let bb = calculate_bollinger(&prices, 5, 2.0).unwrap();

        assert_eq!(bb.middle, 3.0);
        assert!((bb.upper - (3.0 + 2.0 * 2f64.sqrt())).abs() < 1e-12);
        assert!((bb.middle - bb.lower - (bb.upper - bb.middle)).abs() < 1e-12);
    }

    #[test]
    fn test_uses_trailing_window() {
        let mut prices = vec![1000.0; 5];
        prices.extend(vec![10.0; 20]);
        let bb = calculate_bollinger(&prices, 20, 2.0).unwrap();
        assert_eq!(bb.middle, 10.0);
    }

    #[test]
    fn test_insufficient_data() {
        assert!(calculate_bollinger(&[1.0, 2.0], 20, 2.0).is_none());
    }
}
