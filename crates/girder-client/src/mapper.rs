use girder_core::{ConnectionKey, EngineOperation, OperationKind, OperationSettings};

use crate::request::RequestConfig;

/// Connection identity of a request: which pooled participant it runs on.
pub(crate) fn connection_key(config: &RequestConfig) -> ConnectionKey {
    ConnectionKey {
        project_dir: config.project_dir.clone(),
        engine_user_home: config.engine_user_home.clone(),
        distribution: config.distribution.clone(),
    }
}

/// Build the ready-to-run operation for any of the four kinds. One code path
/// on purpose: every kind gets every configured option, applied in the same
/// order, ending with the plain listeners and then the typed listeners in
/// caller-supplied order.
pub(crate) fn to_operation(kind: OperationKind, config: &RequestConfig) -> EngineOperation {
    let mut settings = OperationSettings::new();
    settings.standard_output = config.standard_output.clone();
    settings.standard_error = config.standard_error.clone();
    settings.standard_input = config.standard_input.clone();
    settings.color_output = config.color_output;
    settings.runtime_home = config.runtime_home.clone();
    settings.runtime_arguments = config.runtime_arguments.clone();
    settings.engine_arguments = config.engine_arguments.clone();
    settings.environment = config.environment.clone();
    settings.cancellation = config.cancellation.clone();
    settings.progress_listeners = config.progress_listeners.clone();
    settings.event_listeners = config.event_listeners.clone();
    EngineOperation { kind, settings }
}
