//! End-to-end pipeline tests against in-memory backends.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use clipforge_discovery::{
    ClipDiscovery, DiscoveryConfig, DiscoveryError, DiscoveryResult, VideoDetails, VideoMetadataProvider,
};
use clipforge_models::{
    BatchClipStatus, BatchClipUpdate, BatchStatus, ClipCapture, JobId, JobStatus, ModelError,
    ProcessingJob, ProjectStatus, QualityTier, RenderSettingsRequest, SourceAsset, SourceOrigin, SourceProvenance,
    Transcript, TranscriptSegment, UploadedVideo, WorkerUpdate,
};
use clipforge_pipeline::{
    CreateJobRequest, NewProject, Pipeline, PipelineConfig, PipelineError, UploadTarget,
};
use clipforge_render_client::{RenderClientError, RenderClientResult, RenderDispatcher};
use clipforge_storage::{MemoryObjectStore, ObjectStore};
use clipforge_store::{
    JobRepository, JobVersion, MemoryBatchRepository, MemoryJobRepository, MemoryProjectRepository,
    Repositories, StoreResult,
};

const USER: &str = "user-1";

struct RecordingDispatcher {
    tx: mpsc::UnboundedSender<JobId>,
}

#[async_trait]
impl RenderDispatcher for RecordingDispatcher {
    async fn dispatch(&self, job_id: &JobId) -> RenderClientResult<()> {
        let _ = self.tx.send(job_id.clone());
        Ok(())
    }
}

struct FailingDispatcher;

#[async_trait]
impl RenderDispatcher for FailingDispatcher {
    async fn dispatch(&self, _job_id: &JobId) -> RenderClientResult<()> {
        Err(RenderClientError::ServiceUnavailable("connection refused".into()))
    }
}

struct StubMetadata;

#[async_trait]
impl VideoMetadataProvider for StubMetadata {
    async fn fetch_details(&self, video_id: &str) -> DiscoveryResult<VideoDetails> {
        if video_id == "missing" {
            return Err(DiscoveryError::VideoNotFound(video_id.to_string()));
        }
        Ok(VideoDetails {
            title: "Stub talk".into(),
            channel_name: Some("Stub channel".into()),
            duration_seconds: 600.0,
        })
    }

    async fn fetch_transcript(&self, _video_id: &str) -> DiscoveryResult<Transcript> {
        Ok(Transcript::new(
            (0..60)
                .map(|i| TranscriptSegment::new(i as f64 * 10.0, 10.0, format!("line {}", i)))
                .collect(),
        ))
    }
}

struct Harness {
    pipeline: Pipeline,
    storage: Arc<MemoryObjectStore>,
    dispatched: mpsc::UnboundedReceiver<JobId>,
}

fn harness_with(config: PipelineConfig) -> Harness {
    let (tx, dispatched) = mpsc::unbounded_channel();
    let storage = Arc::new(MemoryObjectStore::new());
    let pipeline = Pipeline::new(
        Repositories::in_memory(),
        storage.clone(),
        Arc::new(RecordingDispatcher { tx }),
        Arc::new(ClipDiscovery::new(None, None, DiscoveryConfig::default())),
        Some(Arc::new(StubMetadata)),
        config,
    );
    Harness {
        pipeline,
        storage,
        dispatched,
    }
}

fn harness() -> Harness {
    harness_with(PipelineConfig::default())
}

/// Job store that lands a worker update right after the next read, the way
/// a callback arriving between a read and its write would.
#[derive(Default)]
struct RacingJobRepository {
    inner: MemoryJobRepository,
    pending: Mutex<Option<WorkerUpdate>>,
}

impl RacingJobRepository {
    fn race_next_read_with(&self, update: WorkerUpdate) {
        *self.pending.lock().unwrap() = Some(update);
    }
}

#[async_trait]
impl JobRepository for RacingJobRepository {
    async fn get(&self, job_id: &JobId) -> StoreResult<Option<ProcessingJob>> {
        let read = self.inner.get(job_id).await?;
        let pending = self.pending.lock().unwrap().take();
        if let (Some(update), Some(job)) = (pending, &read) {
            let mut raced = job.clone();
            raced.apply_update(&update).unwrap();
            self.inner.save(&raced).await?;
        }
        Ok(read)
    }

    async fn create(&self, job: &ProcessingJob) -> StoreResult<()> {
        self.inner.create(job).await
    }

    async fn save(&self, job: &ProcessingJob) -> StoreResult<()> {
        self.inner.save(job).await
    }

    async fn save_if_unchanged(&self, job: &ProcessingJob, expected: JobVersion) -> StoreResult<bool> {
        self.inner.save_if_unchanged(job, expected).await
    }

    async fn list_by_status(&self, status: JobStatus, limit: usize) -> StoreResult<Vec<ProcessingJob>> {
        self.inner.list_by_status(status, limit).await
    }
}

fn racing_harness(config: PipelineConfig) -> (Harness, Arc<RacingJobRepository>) {
    let (tx, dispatched) = mpsc::unbounded_channel();
    let storage = Arc::new(MemoryObjectStore::new());
    let jobs = Arc::new(RacingJobRepository::default());
    let repos = Repositories {
        projects: Arc::new(MemoryProjectRepository::new()),
        jobs: jobs.clone(),
        batches: Arc::new(MemoryBatchRepository::new()),
    };
    let pipeline = Pipeline::new(
        repos,
        storage.clone(),
        Arc::new(RecordingDispatcher { tx }),
        Arc::new(ClipDiscovery::new(None, None, DiscoveryConfig::default())),
        Some(Arc::new(StubMetadata)),
        config,
    );
    (
        Harness {
            pipeline,
            storage,
            dispatched,
        },
        jobs,
    )
}

async fn next_dispatch(rx: &mut mpsc::UnboundedReceiver<JobId>) -> JobId {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("dispatch not sent in time")
        .expect("dispatch channel closed")
}

async fn uploaded_project(h: &Harness, duration: f64) -> clipforge_models::Project {
    let storage_ref = format!("users/{}/uploads/{}.mp4", USER, uuid_like());
    h.storage.put(storage_ref.clone(), vec![0u8; 16]).await;
    h.pipeline
        .projects
        .create_project(
            USER,
            NewProject {
                title: Some("Upload".into()),
                upload: Some(UploadedVideo {
                    storage_ref,
                    filename: "talk.mp4".into(),
                    size_bytes: Some(16),
                    duration: Some(duration),
                    uploaded_at: Utc::now(),
                }),
                ..NewProject::default()
            },
        )
        .await
        .unwrap()
}

fn uuid_like() -> String {
    format!("{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn analyzed_project(h: &Harness) -> clipforge_models::Project {
    let project = uploaded_project(h, 1800.0).await;
    h.pipeline
        .projects
        .analyze_project(USER, &project.id, None)
        .await
        .unwrap()
}

fn worker_update(status: JobStatus) -> WorkerUpdate {
    WorkerUpdate {
        status,
        progress: None,
        output_ref: None,
        error: None,
    }
}

#[tokio::test]
async fn test_analysis_falls_back_and_respects_clip_invariants() {
    let h = harness();
    let project = analyzed_project(&h).await;

    assert_eq!(project.status, ProjectStatus::Analyzed);
    let analysis = project.analysis.as_ref().unwrap();
    assert!(analysis.used_fallback);
    assert_eq!(analysis.fallback_reason.as_deref(), Some("not_configured"));

    assert_eq!(project.clips.len(), 8);
    let preset = project.platform_preset;
    for clip in &project.clips {
        assert!(clip.start_time >= 0.0 && clip.start_time < clip.end_time);
        assert!(clip.end_time <= 1800.0);
        assert!(preset.accepts(clip.duration));
        assert!(project.clip_ai_data[&clip.id].from_fallback);
    }
    for pair in project.clips.windows(2) {
        assert!(pair[0].end_time <= pair[1].start_time);
    }
}

#[tokio::test]
async fn test_analysis_uses_metadata_provider() {
    let h = harness();
    let project = h
        .pipeline
        .projects
        .create_project(
            USER,
            NewProject {
                video_id: Some("abc123".into()),
                ..NewProject::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(project.title, "Stub talk");
    assert_eq!(project.channel_name.as_deref(), Some("Stub channel"));
    assert_eq!(project.video_duration, Some(600.0));

    let analyzed = h
        .pipeline
        .projects
        .analyze_project(USER, &project.id, None)
        .await
        .unwrap();
    assert!(analyzed.analysis.as_ref().unwrap().transcript_available);
    assert!(analyzed.clips.iter().all(|c| !c.transcript.is_empty()));
}

#[tokio::test]
async fn test_analysis_without_duration_fails_project() {
    let h = harness();
    let project = h
        .pipeline
        .projects
        .create_project(
            USER,
            NewProject {
                title: Some("Unknown".into()),
                video_id: Some("missing".into()),
                ..NewProject::default()
            },
        )
        .await
        .unwrap();

    let err = h
        .pipeline
        .projects
        .analyze_project(USER, &project.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::DurationUnknown(_)));

    let stored = h.pipeline.projects.get_project(USER, &project.id).await.unwrap();
    assert_eq!(stored.status, ProjectStatus::Failed);
}

#[tokio::test]
async fn test_create_project_requires_a_video() {
    let h = harness();
    let err = h
        .pipeline
        .projects
        .create_project(USER, NewProject::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_create_project_rejects_foreign_upload() {
    let h = harness();
    h.storage.put("users/other/uploads/a.mp4", vec![1]).await;
    let err = h
        .pipeline
        .projects
        .create_project(
            USER,
            NewProject {
                upload: Some(UploadedVideo {
                    storage_ref: "users/other/uploads/a.mp4".into(),
                    filename: "a.mp4".into(),
                    size_bytes: None,
                    duration: Some(60.0),
                    uploaded_at: Utc::now(),
                }),
                ..NewProject::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_eviction_removes_exactly_the_oldest_project() {
    let h = harness_with(PipelineConfig {
        max_projects_per_user: 2,
        ..PipelineConfig::default()
    });

    let first = uploaded_project(&h, 600.0).await;
    h.storage
        .put(format!("{}source/video.mp4", first.storage_prefix()), vec![1])
        .await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = uploaded_project(&h, 600.0).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let third = uploaded_project(&h, 600.0).await;

    let ids: Vec<_> = h
        .pipeline
        .projects
        .list_projects(USER)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec![third.id.clone(), second.id.clone()]);

    assert!(h
        .storage
        .list_prefix(&first.storage_prefix())
        .await
        .unwrap()
        .is_empty());
    let first_upload = first.video.upload.as_ref().unwrap();
    assert!(!h.storage.exists(&first_upload.storage_ref).await.unwrap());
    let second_upload = second.video.upload.as_ref().unwrap();
    assert!(h.storage.exists(&second_upload.storage_ref).await.unwrap());
}

#[tokio::test]
async fn test_delete_project_removes_record_and_objects() {
    let h = harness();
    let project = uploaded_project(&h, 600.0).await;
    let key = format!("{}exports/clip.mp4", project.storage_prefix());
    h.storage.put(key.clone(), vec![1]).await;

    h.pipeline.projects.delete_project(USER, &project.id).await.unwrap();

    assert!(!h.storage.exists(&key).await.unwrap());
    assert!(matches!(
        h.pipeline.projects.get_project(USER, &project.id).await,
        Err(PipelineError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_source_asset_attaches_once() {
    let h = harness();
    let project = uploaded_project(&h, 600.0).await;
    let asset_ref = format!("{}source/asset.mp4", project.storage_prefix());
    h.storage.put(asset_ref.clone(), vec![1]).await;

    let asset = SourceAsset {
        storage_ref: asset_ref,
        duration: 600.0,
        format: "mp4".into(),
        captured_at: Utc::now(),
        provenance: SourceProvenance::ServerDownload,
    };
    h.pipeline
        .projects
        .attach_source_asset(USER, &project.id, asset.clone())
        .await
        .unwrap();

    let err = h
        .pipeline
        .projects
        .attach_source_asset(USER, &project.id, asset)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Model(ModelError::SourceAssetAlreadyAttached(_))
    ));
}

#[tokio::test]
async fn test_capture_source_wins_and_project_asset_is_unchanged() {
    let mut h = harness();
    let project = analyzed_project(&h).await;

    let asset_ref = format!("{}source/asset.mp4", project.storage_prefix());
    h.storage.put(asset_ref.clone(), vec![1]).await;
    let project = h
        .pipeline
        .projects
        .attach_source_asset(
            USER,
            &project.id,
            SourceAsset {
                storage_ref: asset_ref,
                duration: 1800.0,
                format: "mp4".into(),
                captured_at: Utc::now(),
                provenance: SourceProvenance::Uploaded,
            },
        )
        .await
        .unwrap();
    let asset_before = project.source_asset.clone();

    let clip = &project.clips[0];
    let capture_ref = format!("{}captures/{}/seg.mp4", project.storage_prefix(), clip.id);
    h.storage.put(capture_ref.clone(), vec![1]).await;

    let job = h
        .pipeline
        .jobs
        .create_job(
            USER,
            &project.id,
            CreateJobRequest {
                clip_id: clip.id.clone(),
                settings: RenderSettingsRequest::default(),
                capture: Some(ClipCapture {
                    storage_ref: capture_ref.clone(),
                    duration: Some(clip.duration),
                    format: "mp4".into(),
                    captured_at: Utc::now(),
                }),
            },
        )
        .await
        .unwrap();

    assert_eq!(job.source.origin, SourceOrigin::ClipCapture);
    assert_eq!(job.source.storage_ref, capture_ref);
    assert_eq!(next_dispatch(&mut h.dispatched).await, job.id);

    let after = h.pipeline.projects.get_project(USER, &project.id).await.unwrap();
    assert_eq!(after.source_asset, asset_before);
}

#[tokio::test]
async fn test_export_without_any_source_is_a_precondition_error() {
    let h = harness();
    let project = h
        .pipeline
        .projects
        .create_project(
            USER,
            NewProject {
                video_id: Some("abc123".into()),
                ..NewProject::default()
            },
        )
        .await
        .unwrap();
    let project = h
        .pipeline
        .projects
        .analyze_project(USER, &project.id, None)
        .await
        .unwrap();

    let err = h
        .pipeline
        .jobs
        .create_job(
            USER,
            &project.id,
            CreateJobRequest {
                clip_id: project.clips[0].id.clone(),
                ..CreateJobRequest::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoVideoSource(_)));
}

#[tokio::test]
async fn test_job_uses_saved_clip_settings() {
    let mut h = harness();
    let project = analyzed_project(&h).await;
    let clip = project.clips[0].clone();

    h.pipeline
        .projects
        .save_clip_settings(
            USER,
            &project.id,
            &clip.id,
            RenderSettingsRequest {
                quality: Some(QualityTier::High),
                ..RenderSettingsRequest::default()
            },
        )
        .await
        .unwrap();

    let job = h
        .pipeline
        .jobs
        .create_job(
            USER,
            &project.id,
            CreateJobRequest {
                clip_id: clip.id.clone(),
                ..CreateJobRequest::default()
            },
        )
        .await
        .unwrap();
    next_dispatch(&mut h.dispatched).await;

    assert_eq!(job.quality(), QualityTier::High);
    assert_eq!(job.settings.crop.position_x, 50);
    assert_eq!(job.settings.audio.primary_volume, 100);
    assert_eq!(job.settings.audio.secondary_volume, 0);
    assert_eq!(job.start_time, clip.start_time);
    assert_eq!(job.end_time, clip.end_time);
    assert_eq!(job.source.origin, SourceOrigin::DirectUpload);

    let bad_trim = h
        .pipeline
        .projects
        .save_clip_settings(
            USER,
            &project.id,
            &clip.id,
            RenderSettingsRequest {
                trim_end: Some(clip.end_time + 10.0),
                ..RenderSettingsRequest::default()
            },
        )
        .await;
    assert!(bad_trim.is_err());
}

#[tokio::test]
async fn test_dispatch_failure_leaves_job_queued() {
    let storage = Arc::new(MemoryObjectStore::new());
    let pipeline = Pipeline::new(
        Repositories::in_memory(),
        storage.clone(),
        Arc::new(FailingDispatcher),
        Arc::new(ClipDiscovery::new(None, None, DiscoveryConfig::default())),
        None,
        PipelineConfig::default(),
    );
    let h = Harness {
        pipeline,
        storage,
        dispatched: mpsc::unbounded_channel().1,
    };
    let project = analyzed_project(&h).await;

    let job = h
        .pipeline
        .jobs
        .create_job(
            USER,
            &project.id,
            CreateJobRequest {
                clip_id: project.clips[0].id.clone(),
                ..CreateJobRequest::default()
            },
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let stored = h.pipeline.jobs.get_job(USER, &job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Queued);
    assert_eq!(stored.dispatch_attempts, 1);
}

#[tokio::test]
async fn test_worker_updates_and_retry() {
    let mut h = harness();
    let project = analyzed_project(&h).await;
    let job = h
        .pipeline
        .jobs
        .create_job(
            USER,
            &project.id,
            CreateJobRequest {
                clip_id: project.clips[0].id.clone(),
                ..CreateJobRequest::default()
            },
        )
        .await
        .unwrap();
    next_dispatch(&mut h.dispatched).await;

    // Retry is only valid from failed.
    let err = h.pipeline.jobs.retry_job(USER, &job.id).await.unwrap_err();
    assert!(matches!(err, PipelineError::Model(ModelError::InvalidTransition { .. })));

    let jobs = &h.pipeline.jobs;
    jobs.apply_worker_update(
        &job.id,
        &WorkerUpdate {
            progress: Some(150),
            ..worker_update(JobStatus::Processing)
        },
    )
    .await
    .unwrap();
    let failed = jobs
        .apply_worker_update(
            &job.id,
            &WorkerUpdate {
                error: Some("encoder crashed".into()),
                ..worker_update(JobStatus::Failed)
            },
        )
        .await
        .unwrap();
    assert_eq!(failed.progress, 100);
    assert_eq!(failed.error.as_deref(), Some("encoder crashed"));

    let late = jobs
        .apply_worker_update(&job.id, &worker_update(JobStatus::Processing))
        .await;
    assert!(late.is_err());

    let retried = jobs.retry_job(USER, &job.id).await.unwrap();
    assert_eq!(retried.status, JobStatus::Queued);
    assert_eq!(retried.retry_count, 1);
    assert!(retried.error.is_none());
    assert_eq!(next_dispatch(&mut h.dispatched).await, job.id);

    let done = jobs
        .apply_worker_update(
            &job.id,
            &WorkerUpdate {
                output_ref: Some(format!("{}exports/out.mp4", project.storage_prefix())),
                ..worker_update(JobStatus::Completed)
            },
        )
        .await
        .unwrap();
    assert_eq!(done.progress, 100);
    assert!(done.completed_at.is_some());

    let view = jobs.get_job_status(USER, &job.id).await.unwrap();
    assert_eq!(view.status, JobStatus::Completed);
    let url = jobs.download_url(USER, &job.id).await.unwrap();
    assert!(url.contains("exports/out.mp4"));

    assert!(matches!(
        jobs.get_job_status("someone-else", &job.id).await,
        Err(PipelineError::NotFound { .. })
    ));
}

async fn batch_with_jobs(h: &mut Harness, count: usize) -> (clipforge_models::BatchExport, Vec<JobId>) {
    let project = analyzed_project(h).await;
    let clip_ids: Vec<String> = project.clips.iter().take(count).map(|c| c.id.clone()).collect();
    let batch = h
        .pipeline
        .batches
        .create_batch(USER, &project.id, clip_ids.clone())
        .await
        .unwrap();
    assert_eq!(batch.total_clips as usize, count);
    assert!(batch.clips.iter().all(|c| c.status == BatchClipStatus::Pending));

    let mut job_ids = Vec::new();
    for clip_id in clip_ids {
        let job = h
            .pipeline
            .jobs
            .create_job(
                USER,
                &project.id,
                CreateJobRequest {
                    clip_id: clip_id.clone(),
                    ..CreateJobRequest::default()
                },
            )
            .await
            .unwrap();
        next_dispatch(&mut h.dispatched).await;
        h.pipeline
            .batches
            .update_batch_clip(
                USER,
                &batch.id,
                &clip_id,
                &BatchClipUpdate {
                    job_id: Some(job.id.clone()),
                    status: Some(BatchClipStatus::Processing),
                    ..BatchClipUpdate::default()
                },
            )
            .await
            .unwrap();
        job_ids.push(job.id);
    }
    (batch, job_ids)
}

#[tokio::test]
async fn test_pending_batch_reconciles_to_partial_then_disappears() {
    let mut h = harness();
    let (batch, job_ids) = batch_with_jobs(&mut h, 3).await;

    let pending = h
        .pipeline
        .batches
        .get_pending_batch(USER, &batch.project_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pending.status, BatchStatus::Processing);

    for (i, job_id) in job_ids.iter().enumerate() {
        let status = if i < 2 { JobStatus::Completed } else { JobStatus::Failed };
        h.pipeline
            .jobs
            .apply_worker_update(job_id, &worker_update(status))
            .await
            .unwrap();
    }

    let finalized = h
        .pipeline
        .batches
        .get_pending_batch(USER, &batch.project_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(finalized.completed_clips, 2);
    assert_eq!(finalized.failed_clips, 1);
    assert_eq!(finalized.status, BatchStatus::Partial);
    assert!(finalized.completed_at.is_some());

    let stored = h.pipeline.batches.get_batch(USER, &batch.id).await.unwrap();
    assert_eq!(stored.status, BatchStatus::Partial);

    assert!(h
        .pipeline
        .batches
        .get_pending_batch(USER, &batch.project_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_all_failed_batch_is_failed() {
    let mut h = harness();
    let (batch, job_ids) = batch_with_jobs(&mut h, 3).await;
    for job_id in &job_ids {
        h.pipeline
            .jobs
            .apply_worker_update(job_id, &worker_update(JobStatus::Failed))
            .await
            .unwrap();
    }

    let view = h
        .pipeline
        .batches
        .get_pending_batch(USER, &batch.project_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(view.status, BatchStatus::Failed);
    assert_eq!(view.failed_clips, 3);
}

#[tokio::test]
async fn test_cancel_batch_stops_tracking() {
    let mut h = harness();
    let (batch, _) = batch_with_jobs(&mut h, 2).await;

    let cancelled = h.pipeline.batches.cancel_batch(USER, &batch.id).await.unwrap();
    assert_eq!(cancelled.status, BatchStatus::Cancelled);
    // Cancelling twice is harmless.
    h.pipeline.batches.cancel_batch(USER, &batch.id).await.unwrap();

    assert!(h
        .pipeline
        .batches
        .get_pending_batch(USER, &batch.project_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_create_batch_rejects_unknown_and_empty_clips() {
    let h = harness();
    let project = analyzed_project(&h).await;

    let unknown = h
        .pipeline
        .batches
        .create_batch(USER, &project.id, vec!["clip_nope".into()])
        .await;
    assert!(matches!(unknown, Err(PipelineError::NotFound { .. })));

    let empty = h.pipeline.batches.create_batch(USER, &project.id, vec![]).await;
    assert!(matches!(empty, Err(PipelineError::Model(ModelError::EmptyBatch))));

    let dup = project.clips[0].id.clone();
    let batch = h
        .pipeline
        .batches
        .create_batch(USER, &project.id, vec![dup.clone(), dup])
        .await
        .unwrap();
    assert_eq!(batch.total_clips, 1);
}

#[tokio::test]
async fn test_sweeper_redispatches_old_queued_jobs() {
    let mut h = harness_with(PipelineConfig {
        dispatch_retry_after: Duration::ZERO,
        ..PipelineConfig::default()
    });
    let project = analyzed_project(&h).await;
    let job = h
        .pipeline
        .jobs
        .create_job(
            USER,
            &project.id,
            CreateJobRequest {
                clip_id: project.clips[0].id.clone(),
                ..CreateJobRequest::default()
            },
        )
        .await
        .unwrap();
    next_dispatch(&mut h.dispatched).await;

    let report = h.pipeline.sweeper().sweep_once().await.unwrap();
    assert_eq!(report.redispatched, 1);
    assert_eq!(report.stale, 0);
    assert_eq!(next_dispatch(&mut h.dispatched).await, job.id);

    let stored = h.pipeline.jobs.get_job(USER, &job.id).await.unwrap();
    assert_eq!(stored.dispatch_attempts, 2);
}

#[tokio::test]
async fn test_sweeper_does_not_overwrite_a_completion_landing_after_its_read() {
    let (mut h, jobs) = racing_harness(PipelineConfig {
        dispatch_retry_after: Duration::ZERO,
        ..PipelineConfig::default()
    });
    let project = analyzed_project(&h).await;
    let job = h
        .pipeline
        .jobs
        .create_job(
            USER,
            &project.id,
            CreateJobRequest {
                clip_id: project.clips[0].id.clone(),
                ..CreateJobRequest::default()
            },
        )
        .await
        .unwrap();
    next_dispatch(&mut h.dispatched).await;

    let output_ref = format!("{}exports/out.mp4", project.storage_prefix());
    jobs.race_next_read_with(WorkerUpdate {
        output_ref: Some(output_ref.clone()),
        ..worker_update(JobStatus::Completed)
    });
    let report = h.pipeline.sweeper().sweep_once().await.unwrap();
    assert_eq!(report.redispatched, 0);
    assert!(h.dispatched.try_recv().is_err());

    let stored = h.pipeline.jobs.get_job(USER, &job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.output_ref.as_deref(), Some(output_ref.as_str()));
    assert_eq!(stored.dispatch_attempts, 1);
}

#[tokio::test]
async fn test_stale_expiry_yields_to_late_progress() {
    let (mut h, jobs) = racing_harness(PipelineConfig::default());
    let project = analyzed_project(&h).await;
    let job = h
        .pipeline
        .jobs
        .create_job(
            USER,
            &project.id,
            CreateJobRequest {
                clip_id: project.clips[0].id.clone(),
                ..CreateJobRequest::default()
            },
        )
        .await
        .unwrap();
    next_dispatch(&mut h.dispatched).await;
    h.pipeline
        .jobs
        .apply_worker_update(&job.id, &worker_update(JobStatus::Processing))
        .await
        .unwrap();

    jobs.race_next_read_with(WorkerUpdate {
        progress: Some(60),
        ..worker_update(JobStatus::Processing)
    });
    let later = Utc::now() + chrono::Duration::hours(2);
    let expired = h
        .pipeline
        .jobs
        .expire_stale(later, Duration::from_secs(3600))
        .await
        .unwrap();
    assert_eq!(expired, 0);

    let stored = h.pipeline.jobs.get_job(USER, &job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Processing);
    assert_eq!(stored.progress, 60);
    assert!(stored.error.is_none());
}

#[tokio::test]
async fn test_worker_update_reapplies_after_losing_a_race() {
    let (mut h, jobs) = racing_harness(PipelineConfig::default());
    let project = analyzed_project(&h).await;
    let job = h
        .pipeline
        .jobs
        .create_job(
            USER,
            &project.id,
            CreateJobRequest {
                clip_id: project.clips[0].id.clone(),
                ..CreateJobRequest::default()
            },
        )
        .await
        .unwrap();
    next_dispatch(&mut h.dispatched).await;

    jobs.race_next_read_with(WorkerUpdate {
        progress: Some(40),
        ..worker_update(JobStatus::Processing)
    });
    let done = h
        .pipeline
        .jobs
        .apply_worker_update(
            &job.id,
            &WorkerUpdate {
                output_ref: Some(format!("{}exports/out.mp4", project.storage_prefix())),
                ..worker_update(JobStatus::Completed)
            },
        )
        .await
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);

    let stored = h.pipeline.jobs.get_job(USER, &job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.progress, 100);
    assert!(stored.output_ref.is_some());
}

#[tokio::test]
async fn test_recently_dispatched_jobs_are_left_alone() {
    let mut h = harness();
    let project = analyzed_project(&h).await;
    h.pipeline
        .jobs
        .create_job(
            USER,
            &project.id,
            CreateJobRequest {
                clip_id: project.clips[0].id.clone(),
                ..CreateJobRequest::default()
            },
        )
        .await
        .unwrap();
    next_dispatch(&mut h.dispatched).await;

    let report = h.pipeline.sweeper().sweep_once().await.unwrap();
    assert_eq!(report.redispatched, 0);
}

#[tokio::test]
async fn test_stale_processing_jobs_expire_only_when_enabled() {
    let mut h = harness();
    let project = analyzed_project(&h).await;
    let job = h
        .pipeline
        .jobs
        .create_job(
            USER,
            &project.id,
            CreateJobRequest {
                clip_id: project.clips[0].id.clone(),
                ..CreateJobRequest::default()
            },
        )
        .await
        .unwrap();
    next_dispatch(&mut h.dispatched).await;
    h.pipeline
        .jobs
        .apply_worker_update(&job.id, &worker_update(JobStatus::Processing))
        .await
        .unwrap();

    // Detection is off by default.
    let report = h.pipeline.sweeper().sweep_once().await.unwrap();
    assert_eq!(report.stale, 0);

    let later = Utc::now() + chrono::Duration::hours(2);
    let expired = h
        .pipeline
        .jobs
        .expire_stale(later, Duration::from_secs(3600))
        .await
        .unwrap();
    assert_eq!(expired, 1);

    let stored = h.pipeline.jobs.get_job(USER, &job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.error.unwrap().starts_with("stale"));
    assert!(h.pipeline.jobs.retry_job(USER, &job.id).await.is_ok());
}

#[tokio::test]
async fn test_upload_urls_are_scoped_to_the_user() {
    let h = harness();
    let source = h
        .pipeline
        .projects
        .create_upload_url(
            USER,
            UploadTarget::SourceVideo {
                filename: "My Talk.mp4".into(),
            },
            "video/mp4",
        )
        .await
        .unwrap();
    assert!(source.storage_ref.starts_with("users/user-1/uploads/"));
    assert!(source.storage_ref.ends_with("My_Talk.mp4"));
    assert!(source.upload_url.contains("upload=1"));

    let project = analyzed_project(&h).await;
    let capture = h
        .pipeline
        .projects
        .create_upload_url(
            USER,
            UploadTarget::ClipCapture {
                project_id: project.id.clone(),
                clip_id: project.clips[0].id.clone(),
            },
            "video/mp4",
        )
        .await
        .unwrap();
    assert!(capture.storage_ref.starts_with(&project.storage_prefix()));
}
