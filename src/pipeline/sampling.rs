//! Local random draws injected into prompts.
//!
//! The model is told which customer type, case attributes and rating to
//! produce instead of choosing them itself, which keeps the batch evenly
//! spread across categories.

use std::fmt;
use std::sync::Mutex;

use rand::seq::IndexedRandom;
use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::schema::feedback::MAX_RATING;
use crate::schema::{
    CustomerType, ServiceCase, ServiceCategory, ServiceChannel, ServiceStatus, ServiceType,
};

/// Probability that a drawn customer is a business.
pub const BUSINESS_SHARE: f64 = 0.3;

/// Lowest target rating handed to the feedback prompt.
pub const MIN_TARGET_RATING: u8 = 1;

/// Gender hint for individual customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "Male"),
            Gender::Female => write!(f, "Female"),
        }
    }
}

/// Who the customer prompt should describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomerDraw {
    pub customer_type: CustomerType,
    /// Set for individuals only.
    pub gender: Option<Gender>,
}

impl CustomerDraw {
    /// Label used in the prompt, e.g. `Female Individual`.
    pub fn label(&self) -> String {
        match self.gender {
            Some(gender) => format!("{gender} {}", self.customer_type),
            None => self.customer_type.to_string(),
        }
    }
}

/// Attributes the service-case prompt must use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseDraw {
    pub category: ServiceCategory,
    pub channel: ServiceChannel,
    pub service_type: ServiceType,
    pub status: ServiceStatus,
}

impl CaseDraw {
    /// Names of the attributes `case` did not take from this draw.
    pub fn mismatches(&self, case: &ServiceCase) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if case.category != self.category {
            fields.push("service_category");
        }
        if case.channel != self.channel {
            fields.push("service_channel");
        }
        if case.service_type != self.service_type {
            fields.push("service_type");
        }
        if case.status != self.status {
            fields.push("service_status");
        }
        fields
    }
}

/// Shared random source for every pipeline in a batch.
///
/// With a seed the sequence of draws is reproducible; concurrent pipelines
/// still interleave their draws in scheduling order.
#[derive(Debug)]
pub struct CaseSampler {
    rng: Mutex<ChaCha8Rng>,
}

impl Default for CaseSampler {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CaseSampler {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    fn with_rng<R>(&self, f: impl FnOnce(&mut ChaCha8Rng) -> R) -> R {
        let mut guard = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn customer(&self) -> CustomerDraw {
        self.with_rng(|rng| {
            if rng.random_bool(BUSINESS_SHARE) {
                CustomerDraw {
                    customer_type: CustomerType::Business,
                    gender: None,
                }
            } else {
                let gender = if rng.random_bool(0.5) {
                    Gender::Male
                } else {
                    Gender::Female
                };
                CustomerDraw {
                    customer_type: CustomerType::Individual,
                    gender: Some(gender),
                }
            }
        })
    }

    pub fn case(&self) -> CaseDraw {
        self.with_rng(|rng| CaseDraw {
            category: pick(rng, ServiceCategory::ALL),
            channel: pick(rng, ServiceChannel::ALL),
            service_type: pick(rng, ServiceType::ALL),
            status: pick(rng, ServiceStatus::ALL),
        })
    }

    /// Target satisfaction rating in `1..=5`.
    pub fn rating(&self) -> u8 {
        self.with_rng(|rng| rng.random_range(MIN_TARGET_RATING..=MAX_RATING))
    }
}

fn pick<T: Copy>(rng: &mut ChaCha8Rng, values: &[T]) -> T {
    // Every wire enum has at least one variant.
    *values
        .choose(rng)
        .unwrap_or_else(|| unreachable!("empty variant list"))
}
