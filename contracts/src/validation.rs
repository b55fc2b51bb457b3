//! Input validation for registration calls.
//!
//! Lengths are measured in bytes of UTF-8, matching what clients budget
//! for when they size the stored strings.

use reit_protocol::config::{
    COUNTRY_CODE_LENGTHS, MAX_DECIMALS, MAX_FULL_NAMES_LEN, MAX_ISSUER_LEN, MAX_LISTING_DATE_LEN,
    MAX_SCHEME_NAME_LEN,
};

use crate::error::{EngineError, EngineResult};
use crate::records::IssuerInfo;

fn within(value: &str, max: usize) -> bool {
    !value.is_empty() && value.len() <= max
}

pub fn issuer(info: &IssuerInfo) -> EngineResult<()> {
    if !within(&info.issuer_name, MAX_ISSUER_LEN) {
        return Err(EngineError::InvalidIssuerLength(info.issuer_name.len()));
    }
    if !within(&info.scheme_name, MAX_SCHEME_NAME_LEN) {
        return Err(EngineError::InvalidNameLength(info.scheme_name.len()));
    }
    if !within(&info.listing_date, MAX_LISTING_DATE_LEN) {
        return Err(EngineError::InvalidListingDateLength(
            info.listing_date.len(),
        ));
    }
    Ok(())
}

pub fn country(code: &str) -> EngineResult<()> {
    if COUNTRY_CODE_LENGTHS.contains(&code.len()) {
        Ok(())
    } else {
        Err(EngineError::InvalidCountryLength(code.len()))
    }
}

pub fn full_names(names: &str) -> EngineResult<()> {
    if within(names, MAX_FULL_NAMES_LEN) {
        Ok(())
    } else {
        Err(EngineError::InvalidFullNamesLength(names.len()))
    }
}

pub fn unit_economics(unit_cost: u64, decimals: u8) -> EngineResult<()> {
    if unit_cost == 0 {
        return Err(EngineError::InvalidUnitCost);
    }
    if decimals > MAX_DECIMALS {
        return Err(EngineError::InvalidDecimals(decimals));
    }
    Ok(())
}
