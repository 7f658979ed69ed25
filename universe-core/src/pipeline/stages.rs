//! Builtin stage functions: thin adapters from resolved parameters to the
//! inclusion algorithms.

use crate::calendar::Calendar;
use crate::data::{FunctionRegistry, Params, StageFunction};
use crate::error::{Result, UniverseError};
use crate::inclusion::{self, ValidityRange};
use crate::value::Value;

/// Registry pre-populated with the builtin stage functions.
pub fn stage_functions() -> FunctionRegistry<StageFunction> {
    let mut registry: FunctionRegistry<StageFunction> = FunctionRegistry::new();
    registry
        .register("range_validity", range_validity)
        .register("ranking", ranking)
        .register("rolling_validity", rolling_validity)
        .register(
            "rolling_correlation_rank_validity",
            rolling_correlation_rank_validity,
        )
        .register("combine_validity", combine_validity);
    registry
}

fn tolerance(p: &Params) -> Result<usize> {
    Ok(p.optional_usize("tolerance_timeframes")?.unwrap_or(0))
}

fn range_validity(p: &Params, calendar: &Calendar) -> Result<Value> {
    let entries = p
        .list("values")?
        .iter()
        .map(ValidityRange::from_value)
        .collect::<Result<Vec<_>>>()?;
    inclusion::range_validity(&entries, calendar).map(Value::from)
}

fn ranking(p: &Params, calendar: &Calendar) -> Result<Value> {
    inclusion::ranking(
        &*p.frame("values")?,
        p.f64("threshold_pct")?,
        tolerance(p)?,
        calendar,
    )
    .map(Value::from)
}

fn rolling_validity(p: &Params, calendar: &Calendar) -> Result<Value> {
    inclusion::rolling_validity(
        &*p.frame("values")?,
        p.f64("threshold_pct")?,
        p.usize("rolling_window")?,
        tolerance(p)?,
        calendar,
    )
    .map(Value::from)
}

fn rolling_correlation_rank_validity(p: &Params, calendar: &Calendar) -> Result<Value> {
    inclusion::rolling_correlation_rank_validity(
        &*p.frame("values")?,
        &*p.frame("rankings")?,
        p.usize("rolling_window")?,
        p.f64("threshold")?,
        calendar,
    )
    .map(Value::from)
}

fn combine_validity(p: &Params, _calendar: &Calendar) -> Result<Value> {
    let frames = p
        .list("frames")?
        .iter()
        .map(|v| {
            v.as_universe().cloned().ok_or_else(|| {
                UniverseError::type_mismatch(
                    &format!("{}.frames", p.owner()),
                    "universe frame",
                    v.type_name(),
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;
    inclusion::combine_validity(frames.iter().map(|f| f.as_ref())).map(Value::from)
}
