use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use fwgen_lib::PipelineError;
use fwgen_lib::source::CleanupOutcome;
use fwgen_lib::warning::PipelineWarning;

use super::common::{Behavior, CONFIG_TEMPLATE, ScriptedStrategy, TestPipeline, lab_request};

#[tokio::test]
async fn lab_request_end_to_end() {
  let tool = ScriptedStrategy::new("arduino-cli", Behavior::Succeed);
  let env = TestPipeline::new(std::slice::from_ref(&tool));

  let result = env.pipeline.generate(&CancellationToken::new(), &lab_request()).await.unwrap();

  assert_eq!(result.tool_name, "arduino-cli");
  assert_eq!(result.board, "esp32:esp32:esp32");
  assert_eq!(result.binary_size, 8);
  assert_eq!(result.workspace, env.builds_dir().join(result.build_id.as_str()));
  assert!(result.binary_path.starts_with(&result.workspace));
  assert!(result.binary_path.is_file());

  let seen = tool.seen();
  assert_eq!(seen.len(), 1);
  let header = &seen[0].1;
  assert!(header.contains("#define BACKEND_HOST \"10.0.0.1\""));
  assert!(header.contains("#define BACKEND_PORT 8080"));
  assert!(header.contains("#define TOKEN \"abc123\""));
  assert!(header.contains("#define STATIC_IP_ADDRESS 10, 0, 0, 5"));
  assert!(header.contains("\n#define STATIC_IP\n"));
  assert!(header.contains("\n#define USE_GO_BACKEND\n"));
  assert_eq!(header.matches("#define WIFI_SSID \"lab-net\"").count(), 2);
  // Only the first BACKEND_HOST definition is rewritten.
  assert!(header.contains("#define BACKEND_HOST \"192.168.4.1\""));
}

#[tokio::test]
async fn shared_source_is_never_modified() {
  let tool = ScriptedStrategy::new("platformio", Behavior::Succeed);
  let env = TestPipeline::new(&[tool]);

  env.pipeline.generate(&CancellationToken::new(), &lab_request()).await.unwrap();

  assert_eq!(env.source_header(), CONFIG_TEMPLATE);
}

#[tokio::test]
async fn stale_source_is_a_warning() {
  let tool = ScriptedStrategy::new("platformio", Behavior::Succeed);
  let env = TestPipeline::new(&[tool]);

  let result = env.pipeline.generate(&CancellationToken::new(), &lab_request()).await.unwrap();

  assert!(
    result
      .warnings
      .iter()
      .any(|w| matches!(w, PipelineWarning::StaleSource { .. }))
  );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_builds_use_distinct_workspaces() {
  let tool = ScriptedStrategy::new("platformio", Behavior::Succeed);
  let env = Arc::new(TestPipeline::new(std::slice::from_ref(&tool)));

  let mut handles = Vec::new();
  for i in 0..6 {
    let env = Arc::clone(&env);
    handles.push(tokio::spawn(async move {
      let mut request = lab_request();
      request.host_ssid = format!("net-{i}");
      let result = env.pipeline.generate(&CancellationToken::new(), &request).await.unwrap();
      (i, result)
    }));
  }

  let mut workspaces = HashSet::new();
  for handle in handles {
    let (i, result) = handle.await.unwrap();
    assert!(workspaces.insert(result.workspace.clone()));

    // Each build saw its own SSID and nobody else's.
    let (_, header) = tool
      .seen()
      .into_iter()
      .find(|(dir, _)| *dir == result.workspace)
      .unwrap();
    assert!(header.contains(&format!("#define WIFI_SSID \"net-{i}\"")));
  }
  assert_eq!(workspaces.len(), 6);
  assert_eq!(env.workspace_count(), 6);
}

#[tokio::test]
async fn compile_failure_removes_workspace() {
  let tool = ScriptedStrategy::new("platformio", Behavior::FailCompile);
  let env = TestPipeline::new(std::slice::from_ref(&tool));

  let err = env.pipeline.generate(&CancellationToken::new(), &lab_request()).await.unwrap_err();

  assert!(matches!(err, PipelineError::Build(_)));
  assert!(err.to_string().starts_with("firmware build failed"));
  assert!(err.to_string().contains("was not declared"));
  assert_eq!(tool.seen().len(), 1);
  assert_eq!(env.workspace_count(), 0);
}

#[tokio::test]
async fn missing_artifact_is_distinct_from_compile_failure() {
  let tool = ScriptedStrategy::new("platformio", Behavior::EmitNothing);
  let env = TestPipeline::new(&[tool]);

  let err = env.pipeline.generate(&CancellationToken::new(), &lab_request()).await.unwrap_err();

  assert!(matches!(
    err,
    PipelineError::Build(fwgen_lib::toolchain::ToolchainError::ArtifactNotFound { .. })
  ));
  assert_eq!(env.workspace_count(), 0);
}

#[tokio::test]
async fn no_tool_available_removes_workspace() {
  let mut tool = ScriptedStrategy::new("platformio", Behavior::Succeed);
  tool.available = false;
  let env = TestPipeline::new(&[tool]);

  let err = env.pipeline.generate(&CancellationToken::new(), &lab_request()).await.unwrap_err();

  assert!(matches!(err, PipelineError::NoTool(_)));
  assert!(err.to_string().starts_with("no build tool available"));
  assert_eq!(env.workspace_count(), 0);
}

#[tokio::test]
async fn preferred_tool_is_used_when_available() {
  let first = ScriptedStrategy::new("platformio", Behavior::Succeed);
  let second = ScriptedStrategy::new("arduino-cli", Behavior::Succeed);
  let env = TestPipeline::new(&[first.clone(), second.clone()]);

  let mut request = lab_request();
  request.build_tool = Some("arduino-cli".to_string());
  let result = env.pipeline.generate(&CancellationToken::new(), &request).await.unwrap();

  assert_eq!(result.tool_name, "arduino-cli");
  assert!(first.seen().is_empty());
  assert_eq!(second.seen().len(), 1);
}

#[tokio::test]
async fn missing_config_header_is_fatal() {
  let tool = ScriptedStrategy::new("platformio", Behavior::Succeed);
  let env = TestPipeline::new(std::slice::from_ref(&tool));
  std::fs::remove_file(env.pipeline.config().source_dir().join("include/config.h")).unwrap();

  let err = env.pipeline.generate(&CancellationToken::new(), &lab_request()).await.unwrap_err();

  assert!(matches!(err, PipelineError::Config(_)));
  assert!(err.to_string().starts_with("failed to replace config"));
  assert!(tool.seen().is_empty());
  assert_eq!(env.workspace_count(), 0);
}

#[tokio::test]
async fn cancelled_build_removes_workspace() {
  let tool = ScriptedStrategy::new("platformio", Behavior::Hang);
  let env = TestPipeline::new(&[tool]);
  let cancel = CancellationToken::new();

  let canceller = {
    let cancel = cancel.clone();
    tokio::spawn(async move {
      tokio::time::sleep(std::time::Duration::from_millis(100)).await;
      cancel.cancel();
    })
  };
  let err = env.pipeline.generate(&cancel, &lab_request()).await.unwrap_err();
  canceller.await.unwrap();

  assert!(err.is_cancelled());
  assert_eq!(env.workspace_count(), 0);
}

#[tokio::test]
async fn binary_path_and_cleanup_by_id() {
  let tool = ScriptedStrategy::new("platformio", Behavior::Succeed);
  let env = TestPipeline::new(&[tool]);
  let result = env.pipeline.generate(&CancellationToken::new(), &lab_request()).await.unwrap();
  let id = result.build_id.as_str();

  assert_eq!(env.pipeline.binary_path(id).unwrap(), result.binary_path);

  assert_eq!(env.pipeline.cleanup_build(id).await.unwrap(), CleanupOutcome::Removed);
  assert!(matches!(env.pipeline.binary_path(id), Err(PipelineError::BuildNotFound(_))));
  assert_eq!(env.pipeline.cleanup_build(id).await.unwrap(), CleanupOutcome::Missing);
}

#[tokio::test]
async fn accessors_reject_unsafe_ids() {
  let env = TestPipeline::new(&[]);

  assert!(matches!(
    env.pipeline.binary_path("../../etc"),
    Err(PipelineError::InvalidBuildId(_))
  ));
  assert!(matches!(
    env.pipeline.cleanup_build("a/b").await,
    Err(PipelineError::InvalidBuildId(_))
  ));
}

#[tokio::test]
async fn available_tools_in_priority_order() {
  let mut missing = ScriptedStrategy::new("platformio", Behavior::Succeed);
  missing.available = false;
  let present = ScriptedStrategy::new("arduino-cli", Behavior::Succeed);
  let env = TestPipeline::new(&[missing, present]);

  assert_eq!(env.pipeline.available_tools(), ["arduino-cli"]);
}
