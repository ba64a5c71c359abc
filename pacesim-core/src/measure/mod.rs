mod data_rate;
mod error_model;

pub use self::{
    data_rate::{DataRate, DataRateParseError},
    error_model::{
        ErrorModel, ErrorRate, ErrorRateError, ErrorRateParseError, ErrorUnit, ErrorUnitParseError,
    },
};
