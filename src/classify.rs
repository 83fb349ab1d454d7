//! Display bands for individual metric values.
//!
//! These breakpoints are fixed reference constants (US EPA AQI for
//! particulates, Sensirion index guidance for TVOC/NOx, common indoor comfort
//! ranges). They only drive the qualitative label shown next to a value and are
//! independent of the user-configured alert thresholds in [`crate::alerts`].
//!
//! Every input lands in exactly one band: values below the first breakpoint
//! (including negatives) take the first band, anything else that fails every
//! comparison (huge values, NaN) takes the last one.

use crate::models::Metric;

// ---

/// US EPA AQI category, used for PM2.5 and PM10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AqiBand {
    Excellent,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    Hazardous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Co2Band {
    Fresh,
    Good,
    Moderate,
    Poor,
}

/// Sensirion VOC / NOx index category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexBand {
    Good,
    Moderate,
    Unhealthy,
    VeryUnhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ThermalBand {
    Cold,
    Comfortable,
    Warm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HumidityBand {
    Dry,
    Comfortable,
    Humid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignalBand {
    Good,
    Okay,
}

/// The band a single value falls into; the variant is fixed by the metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Aqi(AqiBand),
    Co2(Co2Band),
    Index(IndexBand),
    Thermal(ThermalBand),
    Humidity(HumidityBand),
    Signal(SignalBand),
}

impl Tier {
    pub fn label(self) -> &'static str {
        match self {
            Tier::Aqi(AqiBand::Excellent) => "Excellent",
            Tier::Aqi(AqiBand::Moderate) => "Moderate",
            Tier::Aqi(AqiBand::UnhealthySensitive) => "Unhealthy (Sensitive)",
            Tier::Aqi(AqiBand::Unhealthy) => "Unhealthy",
            Tier::Aqi(AqiBand::Hazardous) => "Hazardous",
            Tier::Co2(Co2Band::Fresh) => "Fresh",
            Tier::Co2(Co2Band::Good) => "Good",
            Tier::Co2(Co2Band::Moderate) => "Moderate",
            Tier::Co2(Co2Band::Poor) => "Poor",
            Tier::Index(IndexBand::Good) => "Good",
            Tier::Index(IndexBand::Moderate) => "Moderate",
            Tier::Index(IndexBand::Unhealthy) => "Unhealthy",
            Tier::Index(IndexBand::VeryUnhealthy) => "Very Unhealthy",
            Tier::Thermal(ThermalBand::Cold) => "Cold",
            Tier::Thermal(ThermalBand::Comfortable) => "Comfortable",
            Tier::Thermal(ThermalBand::Warm) => "Warm",
            Tier::Humidity(HumidityBand::Dry) => "Dry",
            Tier::Humidity(HumidityBand::Comfortable) => "Comfortable",
            Tier::Humidity(HumidityBand::Humid) => "Humid",
            Tier::Signal(SignalBand::Good) => "Good",
            Tier::Signal(SignalBand::Okay) => "Okay",
        }
    }

    /// Position within the metric's own ordering, 0 being the first band.
    pub fn rank(self) -> u8 {
        match self {
            Tier::Aqi(b) => b as u8,
            Tier::Co2(b) => b as u8,
            Tier::Index(b) => b as u8,
            Tier::Thermal(b) => b as u8,
            Tier::Humidity(b) => b as u8,
            Tier::Signal(b) => b as u8,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---

pub fn classify(metric: Metric, value: f64) -> Tier {
    match metric {
        Metric::Pm25 => Tier::Aqi(aqi_band(value, [12.0, 35.4, 55.4, 150.4])),
        Metric::Pm10 => Tier::Aqi(aqi_band(value, [54.0, 154.0, 254.0, 354.0])),
        Metric::Co2 => Tier::Co2(co2_band(value)),
        Metric::Tvoc => Tier::Index(index_band(value, [150.0, 250.0, 400.0])),
        Metric::Nox => Tier::Index(index_band(value, [20.0, 150.0, 300.0])),
        Metric::TempC => Tier::Thermal(if value < 18.0 {
            ThermalBand::Cold
        } else if value <= 24.0 {
            ThermalBand::Comfortable
        } else {
            ThermalBand::Warm
        }),
        Metric::Humidity => Tier::Humidity(if value < 30.0 {
            HumidityBand::Dry
        } else if value <= 60.0 {
            HumidityBand::Comfortable
        } else {
            HumidityBand::Humid
        }),
        Metric::Wifi => Tier::Signal(if value > -60.0 {
            SignalBand::Good
        } else {
            SignalBand::Okay
        }),
    }
}

fn aqi_band(value: f64, edges: [f64; 4]) -> AqiBand {
    if value <= edges[0] {
        AqiBand::Excellent
    } else if value <= edges[1] {
        AqiBand::Moderate
    } else if value <= edges[2] {
        AqiBand::UnhealthySensitive
    } else if value <= edges[3] {
        AqiBand::Unhealthy
    } else {
        AqiBand::Hazardous
    }
}

fn co2_band(value: f64) -> Co2Band {
    if value < 600.0 {
        Co2Band::Fresh
    } else if value < 1000.0 {
        Co2Band::Good
    } else if value < 2000.0 {
        Co2Band::Moderate
    } else {
        Co2Band::Poor
    }
}

fn index_band(value: f64, edges: [f64; 3]) -> IndexBand {
    if value <= edges[0] {
        IndexBand::Good
    } else if value <= edges[1] {
        IndexBand::Moderate
    } else if value <= edges[2] {
        IndexBand::Unhealthy
    } else {
        IndexBand::VeryUnhealthy
    }
}
