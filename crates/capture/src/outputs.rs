//! Per-match output construction
//!
//! Maps the configured formats onto concrete sinks when discovery starts
//! recording a match. A sink that fails to set up is logged and skipped;
//! the session starts as long as at least one output is usable.

use chrono::{DateTime, Utc};
use evrcap_config::{AgentConfig, OutputFormat};
use evrcap_protocol::SessionMeta;
use evrcap_sinks::replay::session_filename;
use evrcap_sinks::{
    EventsApiSink, EventsSinkConfig, FanOutSink, FrameSink, NullSink, ReplayFileConfig,
    ReplayFileSink, SinkError, StreamSink, StreamSinkConfig,
};
use tokio_util::sync::CancellationToken;

/// Builds the sink tree for each newly discovered match.
#[derive(Debug, Clone)]
pub struct SinkFactory {
    config: AgentConfig,
}

impl SinkFactory {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Instantiate the configured outputs for one match.
    ///
    /// Returns an error only when *no* output could be set up; partial
    /// failures (say, an unreachable stream server) degrade to the outputs
    /// that did come up.
    pub async fn build(
        &self,
        meta: &SessionMeta,
        created_at: DateTime<Utc>,
        parent: &CancellationToken,
    ) -> Result<FrameSink, SinkError> {
        let mut sinks: Vec<FrameSink> = Vec::new();

        for format in &self.config.formats {
            match format {
                OutputFormat::Replay | OutputFormat::NevrCap => {
                    match self.file_sink(meta, created_at, *format, parent) {
                        Ok(sink) => sinks.push(sink),
                        Err(err) => {
                            tracing::error!(
                                format = format.as_str(),
                                error = %err,
                                "failed to open replay output"
                            );
                        }
                    }
                }
                OutputFormat::Stream => {
                    match StreamSink::connect(self.stream_config(), parent).await {
                        Ok(handle) => {
                            tracing::info!("stream writer connected");
                            sinks.push(handle.into());
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "failed to connect stream writer");
                        }
                    }
                }
                OutputFormat::None => sinks.push(NullSink::spawn(parent).into()),
            }
        }

        if self.config.events_enabled {
            match EventsApiSink::spawn(self.events_config(), parent) {
                Ok(handle) => sinks.push(handle.into()),
                Err(err) => {
                    tracing::error!(error = %err, "failed to set up events writer");
                }
            }
        }

        if sinks.is_empty() {
            return Err(SinkError::init("no usable outputs for session"));
        }
        if sinks.len() == 1 {
            return Ok(sinks.remove(0));
        }
        Ok(FrameSink::FanOut(FanOutSink::new(sinks)))
    }

    fn file_sink(
        &self,
        meta: &SessionMeta,
        created_at: DateTime<Utc>,
        format: OutputFormat,
        parent: &CancellationToken,
    ) -> Result<FrameSink, SinkError> {
        let extension = format
            .file_extension()
            .ok_or_else(|| SinkError::init("format has no file extension"))?;
        let filename = session_filename(created_at, &meta.session_uuid, extension);
        let path = self.config.output_dir.join(filename);

        ReplayFileSink::spawn(ReplayFileConfig::new(path), parent).map(Into::into)
    }

    fn events_config(&self) -> EventsSinkConfig {
        let mut config = EventsSinkConfig::new(&self.config.events_url)
            .with_suppress_eventless(self.config.suppress_eventless);
        if let Some(token) = &self.config.token {
            config = config.with_token(token);
        }
        if let Some(node_id) = &self.config.node_id {
            config = config.with_node_id(node_id);
        }
        if let Some(user_id) = &self.config.user_id {
            config = config.with_user_id(user_id);
        }
        config
    }

    fn stream_config(&self) -> StreamSinkConfig {
        let mut config = StreamSinkConfig::new(&self.config.events_url);
        if let Some(token) = &self.config.token {
            config = config.with_token(token);
        }
        if let Some(node_id) = &self.config.node_id {
            config = config.with_node_id(node_id);
        }
        if let Some(user_id) = &self.config.user_id {
            config = config.with_user_id(user_id);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evrcap_config::parse_formats;

    fn meta(uuid: &str) -> SessionMeta {
        SessionMeta {
            session_uuid: uuid.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_single_replay_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig::default().with_output_dir(dir.path());
        let factory = SinkFactory::new(config);

        let sink = factory
            .build(&meta("A"), Utc::now(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(sink, FrameSink::Handle(_)));

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with("rec_"));
        assert!(files[0].ends_with("_A.echoreplay"));
    }

    #[tokio::test]
    async fn test_multiple_formats_build_fanout() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig::default()
            .with_output_dir(dir.path())
            .with_formats(parse_formats("replay,nevrcap").unwrap());
        let factory = SinkFactory::new(config);

        let sink = factory
            .build(&meta("A"), Utc::now(), &CancellationToken::new())
            .await
            .unwrap();
        match sink {
            FrameSink::FanOut(fanout) => assert_eq!(fanout.children().len(), 2),
            FrameSink::Handle(_) => panic!("expected a fan-out"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_stream_degrades_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AgentConfig::default()
            .with_output_dir(dir.path())
            .with_formats(parse_formats("replay,stream").unwrap());
        config.events_url = "http://127.0.0.1:1".to_string();
        let factory = SinkFactory::new(config);

        // The stream writer cannot connect, but the file sink carries on
        let sink = factory
            .build(&meta("A"), Utc::now(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(sink, FrameSink::Handle(_)));
    }

    #[tokio::test]
    async fn test_no_usable_outputs_is_an_error() {
        let mut config = AgentConfig::default()
            .with_formats(parse_formats("stream").unwrap());
        config.events_url = "http://127.0.0.1:1".to_string();
        let factory = SinkFactory::new(config);

        assert!(matches!(
            factory
                .build(&meta("A"), Utc::now(), &CancellationToken::new())
                .await,
            Err(SinkError::Init(_))
        ));
    }
}
