use tracing::{info, warn};

use super::stages;
use super::PipelineDefinition;
use crate::calendar::Calendar;
use crate::data::{DataStore, FunctionRegistry, Params, StageFunction};
use crate::error::{Result, UniverseError};
use crate::frame::UniverseFrame;
use crate::value::Value;

/// Parameter names owned by the run calendar; stages may not declare them.
pub const RESERVED_PARAMETERS: [&str; 3] = ["start_datetime", "last_datetime", "frequency"];

/// Runs declared stages in order against a shared calendar.
///
/// The executor holds no results. Every call to [`execute_all`] runs the
/// stages again; only the [`DataStore`] passed in memoizes data.
///
/// [`execute_all`]: PipelineExecutor::execute_all
#[derive(Debug)]
pub struct PipelineExecutor {
    pipelines: Vec<PipelineDefinition>,
    calendar: Calendar,
    functions: FunctionRegistry<StageFunction>,
}

impl PipelineExecutor {
    /// An executor with the builtin stage functions registered.
    pub fn new(pipelines: Vec<PipelineDefinition>, calendar: Calendar) -> Self {
        Self {
            pipelines,
            calendar,
            functions: stages::stage_functions(),
        }
    }

    /// Register a custom stage function, replacing any function of that name.
    pub fn register<G>(&mut self, name: impl Into<String>, function: G) -> &mut Self
    where
        G: Fn(&Params, &Calendar) -> Result<Value> + Send + Sync + 'static,
    {
        self.functions.register(name, function);
        self
    }

    pub fn pipelines(&self) -> &[PipelineDefinition] {
        &self.pipelines
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn functions(&self) -> &FunctionRegistry<StageFunction> {
        &self.functions
    }

    /// Run one stage. Any failure is wrapped in `StageFailed` naming it.
    pub fn execute(
        &self,
        store: &mut DataStore,
        pipeline: &PipelineDefinition,
    ) -> Result<(String, UniverseFrame)> {
        let frame = self
            .run_stage(store, pipeline)
            .map_err(|e| UniverseError::in_stage(pipeline.name(), e))?;

        let (rows, columns) = frame.shape();
        info!(
            stage = pipeline.name(),
            function = pipeline.function(),
            rows,
            columns,
            included = frame.included_count(),
            "stage complete"
        );
        if rows * columns > 0 && frame.included_count() == 0 {
            warn!(stage = pipeline.name(), "stage includes no instruments");
        }
        Ok((pipeline.name().to_string(), frame))
    }

    /// Run every stage in declaration order, lazily.
    pub fn execute_all<'a>(
        &'a self,
        store: &'a mut DataStore,
    ) -> impl Iterator<Item = Result<(String, UniverseFrame)>> + 'a {
        self.pipelines
            .iter()
            .map(move |pipeline| self.execute(&mut *store, pipeline))
    }

    fn run_stage(&self, store: &mut DataStore, pipeline: &PipelineDefinition) -> Result<UniverseFrame> {
        if let Some(reserved) = RESERVED_PARAMETERS
            .iter()
            .find(|key| pipeline.parameters().contains_key(**key))
        {
            return Err(UniverseError::ReservedParameter {
                stage: pipeline.name().to_string(),
                parameter: reserved.to_string(),
            });
        }

        let function = self
            .functions
            .get(pipeline.function())
            .cloned()
            .ok_or_else(|| UniverseError::UnknownFunction {
                function: pipeline.function().to_string(),
                requested_by: pipeline.name().to_string(),
            })?;

        let resolved = store.resolve_parameters(pipeline.parameters())?;
        let result = function(&Params::new(pipeline.name(), resolved), &self.calendar)?;
        match result {
            Value::Universe(frame) => Ok(std::sync::Arc::unwrap_or_clone(frame)),
            other => Err(UniverseError::type_mismatch(
                pipeline.name(),
                "universe frame",
                other.type_name(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataCatalog, DataDefinition, ParamValue};

    fn calendar() -> Calendar {
        Calendar::parse("2022-11-01", "2022-11-03", "B").unwrap()
    }

    fn store() -> DataStore {
        let catalog = DataCatalog::from_definitions([
            DataDefinition::new("a", "constant").with_parameter("value", 105i64)
        ])
        .unwrap();
        DataStore::new(catalog)
    }

    #[test]
    fn reserved_parameter_is_rejected() {
        let stage = PipelineDefinition::new("s", "ranking").with_parameter("frequency", "D");
        let executor = PipelineExecutor::new(vec![stage.clone()], calendar());
        let err = executor.execute(&mut store(), &stage).unwrap_err();
        match err {
            UniverseError::StageFailed { stage, source } => {
                assert_eq!(stage, "s");
                assert!(matches!(*source, UniverseError::ReservedParameter { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_universe_result_is_a_type_mismatch() {
        let stage = PipelineDefinition::new("pipeline_a", "add_one")
            .with_parameter("a", ParamValue::reference("a"));
        let mut executor = PipelineExecutor::new(vec![stage.clone()], calendar());
        executor.register("add_one", |p, _| Ok(Value::Int(p.require("a")?.as_i64().unwrap_or(0) + 1)));
        let err = executor.execute(&mut store(), &stage).unwrap_err();
        assert!(err.to_string().contains("pipeline_a"));
        match err {
            UniverseError::StageFailed { source, .. } => {
                assert!(matches!(*source, UniverseError::TypeMismatch { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn custom_stage_sees_resolved_data_and_calendar() {
        let stage = PipelineDefinition::new("pipeline_a", "all_if_105")
            .with_parameter("a", ParamValue::reference("a"));
        let mut executor = PipelineExecutor::new(vec![stage], calendar());
        executor.register("all_if_105", |p, calendar| {
            let keep = p.require("a")?.as_i64() == Some(105);
            Ok(Value::from(UniverseFrame::filled(
                calendar.timestamps(),
                vec!["A".into()],
                Some(keep),
            )))
        });

        let mut store = store();
        let results: Vec<_> = executor.execute_all(&mut store).collect::<Result<_>>().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "pipeline_a");
        assert_eq!(results[0].1.included_count(), 3);
        assert!(store.cache().contains("a"));
    }
}
