//! イメージビルドのコーディネータ
//!
//! 1つのイメージ定義に対して、検証 → 旧IDスナップショット →
//! コンテキストアーカイブ → エンジンビルド → 旧イメージ削除までを
//! この順で実行する。

use crate::args::{merge_build_args, warn_sensitive_build_args};
use crate::context::{ContextArchiver, TarContextBuilder};
use crate::engine::{BuildRequest, DockerEngine, EngineClient, ImageQuery};
use crate::error::{EngineError, Result};
use crate::reference;
use bollard::Docker;
use kiln_core::{ImageSpec, ProjectLayout};
use std::collections::HashMap;
use std::sync::Arc;

/// イメージビルドを実行するコーディネータ
pub struct ImageBuilder {
    engine: Arc<dyn EngineClient>,
    query: Arc<dyn ImageQuery>,
    archiver: Arc<dyn ContextArchiver>,
}

impl ImageBuilder {
    pub fn new(
        engine: Arc<dyn EngineClient>,
        query: Arc<dyn ImageQuery>,
        archiver: Arc<dyn ContextArchiver>,
    ) -> Self {
        Self {
            engine,
            query,
            archiver,
        }
    }

    /// Docker接続から本番用のコーディネータを構築
    pub fn from_docker(docker: Docker) -> Result<Self> {
        let engine = Arc::new(DockerEngine::new(docker));
        let archiver = Arc::new(TarContextBuilder::new()?);
        Ok(Self::new(engine.clone(), engine, archiver))
    }

    /// イメージをビルド
    ///
    /// `no_cache` は呼び出し側の指定がそのままエンジンに渡る。
    /// `caller_args` はイメージ定義側のビルド引数より優先される。
    pub async fn build_image(
        &self,
        spec: &ImageSpec,
        layout: &ProjectLayout,
        no_cache: bool,
        caller_args: &HashMap<String, String>,
    ) -> Result<()> {
        // 1. 参照の検証。ここで失敗したら副作用は一切ない
        reference::validate(&spec.name)?;

        let cleanup = spec.build.cleanup;

        // 2. 削除対象となる旧イメージIDのスナップショット
        let old_image_id = if cleanup.is_remove() {
            self.query.image_id(&spec.name).await?
        } else {
            None
        };

        // 3. ビルドコンテキストのアーカイブ
        let archive = self
            .archiver
            .create_archive(&spec.name, &spec.build, layout)
            .await?;

        // 4. ビルド引数のマージ（呼び出し側が優先）
        let build_args = merge_build_args(caller_args, &spec.build.args);
        warn_sensitive_build_args(&build_args);

        // 5-6. エンジンビルド。失敗した場合はクリーンアップを行わない
        let request = BuildRequest {
            image_name: spec.name.clone(),
            archive,
            dockerfile_name: spec.build.dockerfile_name(),
            force_remove_intermediate: cleanup.is_remove(),
            no_cache,
            build_args,
        };
        self.engine.build_image(&request).await?;

        // 7. 新しいイメージIDの確認
        let new_image_id = self.query.image_id(&spec.name).await?;
        tracing::info!(
            "{}: Built image {}",
            spec.label(),
            new_image_id.as_deref().unwrap_or("<unknown>")
        );

        // 8. 旧イメージの削除。IDが変わっていない場合は何もしない
        if let Some(old) = old_image_id {
            if new_image_id.as_deref() != Some(old.as_str()) {
                match self.engine.remove_image(&old, true).await {
                    Ok(()) => {
                        tracing::info!("{}: Removed image {}", spec.label(), old);
                    }
                    Err(err) if cleanup.tolerates_failure() => {
                        tracing::warn!("{}", tolerated_removal_warning(spec.label(), &err));
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }

        Ok(())
    }
}

/// 旧イメージの削除失敗を許容したときの警告文
///
/// ネストした原因がある場合のみ角括弧で併記する。
fn tolerated_removal_warning(label: &str, err: &EngineError) -> String {
    match err.cause() {
        Some(cause) => format!("{}: {} (old image) [{}]", label, err.message(), cause),
        None => format!("{}: {} (old image)", label, err.message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use async_trait::async_trait;
    use kiln_core::{BuildSpec, CleanupMode};
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum EngineCall {
        Build(BuildRequest),
        Remove { image_id: String, force: bool },
    }

    /// 呼び出しを記録するエンジンのダブル
    #[derive(Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<EngineCall>>,
        build_error: Option<EngineError>,
        remove_error: Option<EngineError>,
    }

    impl RecordingEngine {
        fn calls(&self) -> Vec<EngineCall> {
            self.calls.lock().unwrap().clone()
        }

        fn build_request(&self) -> BuildRequest {
            self.calls()
                .into_iter()
                .find_map(|call| match call {
                    EngineCall::Build(request) => Some(request),
                    _ => None,
                })
                .expect("no build call recorded")
        }

        fn remove_calls(&self) -> Vec<EngineCall> {
            self.calls()
                .into_iter()
                .filter(|call| matches!(call, EngineCall::Remove { .. }))
                .collect()
        }
    }

    #[async_trait]
    impl EngineClient for RecordingEngine {
        async fn build_image(
            &self,
            request: &BuildRequest,
        ) -> std::result::Result<(), EngineError> {
            self.calls
                .lock()
                .unwrap()
                .push(EngineCall::Build(request.clone()));
            match &self.build_error {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        async fn remove_image(
            &self,
            image_id: &str,
            force: bool,
        ) -> std::result::Result<(), EngineError> {
            self.calls.lock().unwrap().push(EngineCall::Remove {
                image_id: image_id.to_string(),
                force,
            });
            match &self.remove_error {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    /// 決められた答えを順に返す照会サービスのダブル
    #[derive(Default)]
    struct ScriptedQuery {
        answers: Mutex<VecDeque<Option<String>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedQuery {
        fn new(answers: &[Option<&str>]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().map(|a| a.map(str::to_string)).collect()),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ImageQuery for ScriptedQuery {
        async fn image_id(
            &self,
            _name: &str,
        ) -> std::result::Result<Option<String>, EngineError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.answers.lock().unwrap().pop_front().unwrap_or(None))
        }
    }

    /// 固定パスを返すアーキバのダブル
    #[derive(Default)]
    struct StubArchiver {
        calls: Mutex<u32>,
    }

    impl StubArchiver {
        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ContextArchiver for StubArchiver {
        async fn create_archive(
            &self,
            _image_name: &str,
            _build: &BuildSpec,
            _layout: &ProjectLayout,
        ) -> Result<PathBuf> {
            *self.calls.lock().unwrap() += 1;
            Ok(PathBuf::from("/scratch/context.tar.gz"))
        }
    }

    fn spec(cleanup: CleanupMode) -> ImageSpec {
        ImageSpec {
            name: "app:1".to_string(),
            description: Some("app".to_string()),
            build: BuildSpec {
                cleanup,
                args: [("A".to_string(), "1".to_string())].into(),
                ..Default::default()
            },
        }
    }

    fn fixture(
        engine: RecordingEngine,
        query: ScriptedQuery,
    ) -> (
        ImageBuilder,
        Arc<RecordingEngine>,
        Arc<ScriptedQuery>,
        Arc<StubArchiver>,
    ) {
        let engine = Arc::new(engine);
        let query = Arc::new(query);
        let archiver = Arc::new(StubArchiver::default());
        let builder = ImageBuilder::new(engine.clone(), query.clone(), archiver.clone());
        (builder, engine, query, archiver)
    }

    fn layout() -> ProjectLayout {
        ProjectLayout::new("/project")
    }

    #[tokio::test]
    async fn test_fresh_build_without_prior_image() {
        let query = ScriptedQuery::new(&[None, Some("sha:N")]);
        let (builder, engine, query, archiver) = fixture(RecordingEngine::default(), query);

        builder
            .build_image(&spec(CleanupMode::Remove), &layout(), false, &HashMap::new())
            .await
            .unwrap();

        // 事前照会と事後照会の2回
        assert_eq!(query.call_count(), 2);
        assert_eq!(archiver.call_count(), 1);

        let request = engine.build_request();
        assert_eq!(request.image_name, "app:1");
        assert!(request.force_remove_intermediate);
        assert!(!request.no_cache);
        assert_eq!(request.dockerfile_name, None);
        assert_eq!(request.build_args.get("A").unwrap(), "1");

        // 旧イメージが無いので削除は行われない
        assert!(engine.remove_calls().is_empty());
    }

    #[tokio::test]
    async fn test_replace_removes_old_image() {
        let query = ScriptedQuery::new(&[Some("sha:O"), Some("sha:N")]);
        let (builder, engine, _, _) = fixture(RecordingEngine::default(), query);

        builder
            .build_image(&spec(CleanupMode::Remove), &layout(), false, &HashMap::new())
            .await
            .unwrap();

        assert_eq!(
            engine.remove_calls(),
            vec![EngineCall::Remove {
                image_id: "sha:O".to_string(),
                force: true,
            }]
        );
    }

    #[tokio::test]
    async fn test_unchanged_image_id_skips_removal() {
        let query = ScriptedQuery::new(&[Some("sha:S"), Some("sha:S")]);
        let (builder, engine, _, _) = fixture(RecordingEngine::default(), query);

        builder
            .build_image(&spec(CleanupMode::Remove), &layout(), false, &HashMap::new())
            .await
            .unwrap();

        assert!(engine.remove_calls().is_empty());
    }

    #[tokio::test]
    async fn test_try_to_remove_tolerates_removal_failure() {
        let engine = RecordingEngine {
            remove_error: Some(EngineError::with_cause("busy", "container X")),
            ..Default::default()
        };
        let query = ScriptedQuery::new(&[Some("sha:O"), Some("sha:N")]);
        let (builder, engine, _, _) = fixture(engine, query);

        // 削除失敗は警告のみでビルド自体は成功扱い
        builder
            .build_image(
                &spec(CleanupMode::TryToRemove),
                &layout(),
                false,
                &HashMap::new(),
            )
            .await
            .unwrap();

        assert_eq!(engine.remove_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_surfaces_removal_failure() {
        let engine = RecordingEngine {
            remove_error: Some(EngineError::new("busy")),
            ..Default::default()
        };
        let query = ScriptedQuery::new(&[Some("sha:O"), Some("sha:N")]);
        let (builder, _, _, _) = fixture(engine, query);

        let err = builder
            .build_image(&spec(CleanupMode::Remove), &layout(), false, &HashMap::new())
            .await
            .unwrap_err();

        match err {
            BuildError::Engine(e) => assert_eq!(e.message(), "busy"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_caller_args_override_spec_args() {
        let query = ScriptedQuery::new(&[None, Some("sha:N")]);
        let (builder, engine, _, _) = fixture(RecordingEngine::default(), query);

        let mut image = spec(CleanupMode::Remove);
        image.build.args = [
            ("K".to_string(), "spec".to_string()),
            ("J".to_string(), "spec".to_string()),
        ]
        .into();
        let caller_args = [("K".to_string(), "caller".to_string())].into();

        builder
            .build_image(&image, &layout(), false, &caller_args)
            .await
            .unwrap();

        let request = engine.build_request();
        assert_eq!(request.build_args.get("K").unwrap(), "caller");
        assert_eq!(request.build_args.get("J").unwrap(), "spec");
        assert_eq!(request.build_args.len(), 2);
    }

    #[tokio::test]
    async fn test_none_skips_snapshot_and_cleanup() {
        let query = ScriptedQuery::new(&[Some("sha:N")]);
        let (builder, engine, query, _) = fixture(RecordingEngine::default(), query);

        builder
            .build_image(&spec(CleanupMode::None), &layout(), false, &HashMap::new())
            .await
            .unwrap();

        // 事前スナップショットは行われず、事後照会の1回のみ
        assert_eq!(query.call_count(), 1);
        assert!(engine.remove_calls().is_empty());
        assert!(!engine.build_request().force_remove_intermediate);
    }

    #[tokio::test]
    async fn test_no_cache_is_forwarded() {
        let query = ScriptedQuery::new(&[None, Some("sha:N")]);
        let (builder, engine, _, _) = fixture(RecordingEngine::default(), query);

        builder
            .build_image(&spec(CleanupMode::Remove), &layout(), true, &HashMap::new())
            .await
            .unwrap();

        assert!(engine.build_request().no_cache);
    }

    #[tokio::test]
    async fn test_invalid_name_touches_no_collaborators() {
        let query = ScriptedQuery::new(&[Some("sha:O"), Some("sha:N")]);
        let (builder, engine, query, archiver) = fixture(RecordingEngine::default(), query);

        let mut image = spec(CleanupMode::Remove);
        image.name = "Bad Name".to_string();

        let err = builder
            .build_image(&image, &layout(), false, &HashMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::InvalidReference { .. }));
        assert!(engine.calls().is_empty());
        assert_eq!(query.call_count(), 0);
        assert_eq!(archiver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_build_failure_skips_cleanup() {
        let engine = RecordingEngine {
            build_error: Some(EngineError::new("step 3/7 failed")),
            ..Default::default()
        };
        let query = ScriptedQuery::new(&[Some("sha:O")]);
        let (builder, engine, query, _) = fixture(engine, query);

        let err = builder
            .build_image(&spec(CleanupMode::Remove), &layout(), false, &HashMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::Engine(_)));
        // ビルド失敗後はIDの照会も削除も行われない
        assert_eq!(query.call_count(), 1);
        assert!(engine.remove_calls().is_empty());
    }

    #[tokio::test]
    async fn test_dockerfile_leaf_name_is_forwarded() {
        let query = ScriptedQuery::new(&[None, Some("sha:N")]);
        let (builder, engine, _, _) = fixture(RecordingEngine::default(), query);

        let mut image = spec(CleanupMode::Remove);
        image.build.dockerfile = Some(PathBuf::from("docker/web/Dockerfile.web"));

        builder
            .build_image(&image, &layout(), false, &HashMap::new())
            .await
            .unwrap();

        assert_eq!(
            engine.build_request().dockerfile_name,
            Some("Dockerfile.web".to_string())
        );
    }

    #[test]
    fn test_tolerated_warning_with_cause() {
        let err = EngineError::with_cause("busy", "container X");
        assert_eq!(
            tolerated_removal_warning("app", &err),
            "app: busy (old image) [container X]"
        );
    }

    #[test]
    fn test_tolerated_warning_without_cause() {
        let err = EngineError::new("busy");
        assert_eq!(
            tolerated_removal_warning("app", &err),
            "app: busy (old image)"
        );
    }
}
