// ---------------------------------------------------------------------------
// Exponential atmosphere with a hard ceiling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Atmosphere {
    pub sea_level_density: f64, // kg/m^3
    pub scale_height: f64,      // m
    pub ceiling: f64,           // m, vacuum above
}

impl Atmosphere {
    /// Kerbin-like: 1.225 kg/m^3 at the surface, 5.6 km scale height, 70 km top.
    pub fn kerbin() -> Self {
        Self { sea_level_density: 1.225, scale_height: 5_600.0, ceiling: 70_000.0 }
    }

    pub fn vacuum() -> Self {
        Self { sea_level_density: 0.0, scale_height: 1.0, ceiling: 0.0 }
    }

    /// Density at geometric altitude; negative altitudes clamp to sea level.
    pub fn density(&self, altitude: f64) -> f64 {
        let h = altitude.max(0.0);
        if h >= self.ceiling {
            return 0.0;
        }
        self.sea_level_density * (-h / self.scale_height).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sea_level_density() {
        let atm = Atmosphere::kerbin();
        assert!((atm.density(0.0) - 1.225).abs() < 1e-12);
        assert!((atm.density(-500.0) - 1.225).abs() < 1e-12);
    }

    #[test]
    fn density_monotonically_decreases() {
        let atm = Atmosphere::kerbin();
        let rho_0 = atm.density(0.0);
        let rho_10k = atm.density(10_000.0);
        let rho_50k = atm.density(50_000.0);
        assert!(rho_0 > rho_10k);
        assert!(rho_10k > rho_50k);
        assert!(rho_50k > 0.0);
    }

    #[test]
    fn vacuum_above_ceiling() {
        let atm = Atmosphere::kerbin();
        assert_eq!(atm.density(70_000.0), 0.0);
        assert_eq!(Atmosphere::vacuum().density(0.0), 0.0);
    }
}
