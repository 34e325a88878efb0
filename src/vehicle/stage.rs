use crate::orbital::burn::G0;
use crate::telemetry::StageId;

/// One physical stage: tanks, engine and the decoupler that drops it.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    /// Staging number at which this stage's tanks and engine are dropped.
    pub decouple_id: StageId,
    pub dry_mass: f64,        // kg
    pub propellant_mass: f64, // kg, LiquidFuel + Oxidizer
    pub thrust: f64,          // N, vacuum
    pub isp: f64,             // s
    pub cd: f64,
    pub area: f64, // m^2, reference area for drag
}

impl Stage {
    /// Propellant consumed per second at full throttle.
    pub fn mass_flow(&self) -> f64 {
        if self.isp > 0.0 {
            self.thrust / (self.isp * G0)
        } else {
            0.0
        }
    }

    pub fn total_mass(&self) -> f64 {
        self.dry_mass + self.propellant_mass
    }

    /// Ideal delta-v of this stage carrying `payload_mass` on top.
    pub fn delta_v(&self, payload_mass: f64) -> f64 {
        let wet = self.total_mass() + payload_mass;
        let dry = self.dry_mass + payload_mass;
        self.isp * G0 * (wet / dry).ln()
    }

    /// Thrust-to-weight at ignition with `payload_mass` above, under gravity `g`.
    pub fn thrust_to_weight(&self, payload_mass: f64, g: f64) -> f64 {
        self.thrust / ((self.total_mass() + payload_mass) * g)
    }
}

/// Builds a [`Stage`] from a few grouped properties.
#[derive(Debug, Clone)]
pub struct StageBuilder {
    stage: Stage,
}

impl StageBuilder {
    pub fn new(name: impl Into<String>, decouple_id: u32) -> Self {
        Self {
            stage: Stage {
                name: name.into(),
                decouple_id: StageId(decouple_id),
                dry_mass: 1_000.0,
                propellant_mass: 4_000.0,
                thrust: 100_000.0,
                isp: 300.0,
                cd: 0.3,
                area: 1.5,
            },
        }
    }

    pub fn tanks(mut self, dry_mass: f64, propellant_mass: f64) -> Self {
        self.stage.dry_mass = dry_mass;
        self.stage.propellant_mass = propellant_mass;
        self
    }

    pub fn engine(mut self, thrust: f64, isp: f64) -> Self {
        self.stage.thrust = thrust;
        self.stage.isp = isp;
        self
    }

    pub fn aero(mut self, cd: f64, area: f64) -> Self {
        self.stage.cd = cd;
        self.stage.area = area;
        self
    }

    pub fn build(self) -> Stage {
        self.stage
    }
}
