// Integration tests for the model session manager

use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use neural_platform::encoding::{decode_data_url, PNG_DATA_URL_PREFIX};
use neural_platform::engine::{
    ImageEngineLoader, SimulatedImageLoader, SimulatedTextLoader, TextEngineLoader,
};
use neural_platform::hardware::{AcceleratorQuery, AdapterInfo, CapabilityProbe};
use neural_platform::metrics::GenerationOutcome;
use neural_platform::engine::Modality;
use neural_platform::{ModelSessionManager, ModelState, SessionError, SessionStatus};

struct FixedAdapter(Option<AdapterInfo>);

impl AcceleratorQuery for FixedAdapter {
    fn request_adapter(&self) -> Result<Option<AdapterInfo>> {
        Ok(self.0.clone())
    }
}

fn cpu_probe() -> CapabilityProbe {
    CapabilityProbe::new(Arc::new(FixedAdapter(None)))
}

fn manager_with(
    text: Arc<SimulatedTextLoader>,
    image: Arc<SimulatedImageLoader>,
) -> ModelSessionManager {
    let text: Arc<dyn TextEngineLoader> = text;
    let image: Arc<dyn ImageEngineLoader> = image;
    ModelSessionManager::builder(text, image)
        .probe(cpu_probe())
        .build()
        .unwrap()
}

fn recorder() -> (Arc<Mutex<Vec<u8>>>, impl Fn(u8) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |p| sink.lock().unwrap().push(p))
}

#[tokio::test]
async fn test_first_request_loads_then_reuses() {
    let text = Arc::new(SimulatedTextLoader::new());
    let manager = manager_with(text.clone(), Arc::new(SimulatedImageLoader::new()));

    let (seen, callback) = recorder();
    manager.set_download_callback("Llama-3.1-8B", callback);

    assert_eq!(manager.get_status("Llama-3.1-8B"), SessionStatus::NotLoaded);

    let first = manager.generate_text("Llama-3.1-8B", "hello").await;
    assert!(first.contains("hello"));
    assert_eq!(manager.get_status("Llama-3.1-8B"), SessionStatus::Ready);

    let progress = seen.lock().unwrap().clone();
    assert_eq!(progress, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);

    // Second request hits the memoized engine: no load, no progress
    let second = manager.generate_text("Llama-3.1-8B", "again").await;
    assert!(second.contains("again"));
    assert_eq!(text.load_count(), 1);
    assert_eq!(seen.lock().unwrap().len(), progress.len());
}

#[tokio::test]
async fn test_modalities_are_isolated() {
    let text = Arc::new(SimulatedTextLoader::new());
    let image = Arc::new(SimulatedImageLoader::new());
    let manager = manager_with(text.clone(), image.clone());

    manager.generate_text("shared-id", "hi").await;
    manager.generate_image("shared-id", "a cat").await.unwrap();

    assert_eq!(text.load_count(), 1);
    assert_eq!(image.load_count(), 1);
    assert_eq!(manager.resident_models(Modality::Text), vec!["shared-id"]);
    assert_eq!(manager.resident_models(Modality::Image), vec!["shared-id"]);
}

#[tokio::test]
async fn test_image_loaded_model_reports_ready() {
    let manager = manager_with(
        Arc::new(SimulatedTextLoader::new()),
        Arc::new(SimulatedImageLoader::new()),
    );

    manager.generate_image("FLUX.1-dev", "a fox").await.unwrap();

    assert_eq!(manager.get_status("FLUX.1-dev"), SessionStatus::Ready);
    assert_eq!(manager.get_status("GPT-4o-mini"), SessionStatus::NotLoaded);
}

#[tokio::test]
async fn test_removed_callback_receives_nothing() {
    let manager = manager_with(
        Arc::new(SimulatedTextLoader::new()),
        Arc::new(SimulatedImageLoader::new()),
    );

    let (seen, callback) = recorder();
    manager.set_download_callback("GPT-4o-mini", callback);
    manager.remove_download_callback("GPT-4o-mini");

    manager.generate_text("GPT-4o-mini", "hi").await;

    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_replacing_callback_routes_to_latest() {
    let manager = manager_with(
        Arc::new(SimulatedTextLoader::new().with_progress_steps(vec![0, 50, 100])),
        Arc::new(SimulatedImageLoader::new()),
    );

    let (old, old_cb) = recorder();
    let (new, new_cb) = recorder();
    manager.set_download_callback("m", old_cb);
    manager.set_download_callback("m", new_cb);

    manager.generate_text("m", "hi").await;

    assert!(old.lock().unwrap().is_empty());
    assert_eq!(*new.lock().unwrap(), vec![0, 50, 100]);
}

#[tokio::test]
async fn test_load_failure_degrades_text() {
    let text = Arc::new(SimulatedTextLoader::new().failing_next(1));
    let manager = manager_with(text.clone(), Arc::new(SimulatedImageLoader::new()));

    let reply = manager.generate_text("GPT-4o-mini", "hi").await;

    assert!(reply.starts_with("Error: "));
    assert!(reply.contains("GPT-4o-mini"));
    assert_eq!(manager.get_status("GPT-4o-mini"), SessionStatus::NotLoaded);
    assert_eq!(manager.model_state("GPT-4o-mini").label(), "error");
    assert_eq!(
        manager
            .metrics()
            .generations(Modality::Text, GenerationOutcome::Error),
        1
    );
}

#[tokio::test]
async fn test_failed_load_is_retried_on_next_request() {
    let text = Arc::new(SimulatedTextLoader::new().failing_next(1));
    let manager = manager_with(text.clone(), Arc::new(SimulatedImageLoader::new()));

    let err = manager.try_generate_text("m", "hi").await.unwrap_err();
    assert!(matches!(err, SessionError::Initialization { .. }));

    let reply = manager.try_generate_text("m", "hi").await.unwrap();
    assert!(reply.contains("demo reply"));
    assert_eq!(text.load_count(), 2);
    assert!(manager.model_state("m").is_ready());
    assert_eq!(manager.metrics().session_loads(Modality::Text, false), 1);
    assert_eq!(manager.metrics().session_loads(Modality::Text, true), 1);
}

#[tokio::test]
async fn test_image_load_failure_propagates() {
    let manager = manager_with(
        Arc::new(SimulatedTextLoader::new()),
        Arc::new(SimulatedImageLoader::new().failing_next(1)),
    );

    let err = manager.generate_image("DALL-E-3", "a cat").await.unwrap_err();

    match err {
        SessionError::Initialization {
            model_id, modality, ..
        } => {
            assert_eq!(model_id, "DALL-E-3");
            assert_eq!(modality, Modality::Image);
        }
        other => panic!("Expected initialization error, got {:?}", other),
    }
    assert_eq!(manager.get_status("DALL-E-3"), SessionStatus::NotLoaded);
    // Counted once as a failed load and once as a failed generation
    assert_eq!(manager.metrics().session_loads(Modality::Image, false), 1);
    assert_eq!(
        manager
            .metrics()
            .generations(Modality::Image, GenerationOutcome::Error),
        1
    );
}

#[tokio::test]
async fn test_image_is_png_data_url() {
    let manager = manager_with(
        Arc::new(SimulatedTextLoader::new()),
        Arc::new(SimulatedImageLoader::new().with_image_size(16)),
    );

    let url = manager
        .generate_image("Stable-Diffusion-XL", "mountains")
        .await
        .unwrap();

    assert!(url.starts_with(PNG_DATA_URL_PREFIX));
    let png = decode_data_url(&url).unwrap();
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_first_requests_load_once() {
    let text = Arc::new(
        SimulatedTextLoader::new().with_step_delay(Duration::from_millis(200)),
    );
    let manager = manager_with(text.clone(), Arc::new(SimulatedImageLoader::new()));

    let (seen, callback) = recorder();
    manager.set_download_callback("m", callback);

    let (a, b, c) = tokio::join!(
        manager.generate_text("m", "one"),
        manager.generate_text("m", "two"),
        manager.generate_text("m", "three"),
    );

    assert!(a.contains("one"));
    assert!(b.contains("two"));
    assert!(c.contains("three"));
    assert_eq!(text.load_count(), 1);
    // One load means one pass over the progress steps
    assert_eq!(seen.lock().unwrap().len(), 11);
}

#[tokio::test(start_paused = true)]
async fn test_state_is_downloading_mid_load() {
    let text = Arc::new(
        SimulatedTextLoader::new()
            .with_progress_steps(vec![0, 50, 100])
            .with_step_delay(Duration::from_secs(1)),
    );
    let manager = Arc::new(manager_with(text, Arc::new(SimulatedImageLoader::new())));

    let task = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.generate_text("m", "hi").await })
    };

    // Past the second step, before the third
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(manager.model_state("m"), ModelState::Downloading { progress: 50 });
    assert_eq!(manager.get_status("m"), SessionStatus::NotLoaded);

    let reply = task.await.unwrap();
    assert!(reply.contains("hi"));
    assert_eq!(manager.model_state("m"), ModelState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_unload_mid_load_leaves_model_available() {
    let text = Arc::new(
        SimulatedTextLoader::new()
            .with_progress_steps(vec![0, 50, 100])
            .with_step_delay(Duration::from_secs(1)),
    );
    let manager = Arc::new(manager_with(text.clone(), Arc::new(SimulatedImageLoader::new())));

    let task = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.generate_text("m", "hi").await })
    };

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(manager.unload("m"));
    assert_eq!(manager.model_state("m"), ModelState::Available);

    // The interrupted load still answers its caller but is not kept
    let reply = task.await.unwrap();
    assert!(reply.contains("hi"));
    assert_eq!(manager.model_state("m"), ModelState::Available);
    assert_eq!(manager.get_status("m"), SessionStatus::NotLoaded);
    assert!(manager.resident_models(Modality::Text).is_empty());

    manager.generate_text("m", "again").await;
    assert_eq!(text.load_count(), 2);
    assert_eq!(manager.model_state("m"), ModelState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_callback_removed_mid_load_stops_receiving() {
    let manager = Arc::new(manager_with(
        Arc::new(SimulatedTextLoader::new().with_step_delay(Duration::from_secs(1))),
        Arc::new(SimulatedImageLoader::new()),
    ));

    let (seen, callback) = recorder();
    manager.set_download_callback("m", callback);

    let task = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.generate_text("m", "hi").await })
    };

    // Steps 0 and 10 have been reported, 20 has not
    tokio::time::sleep(Duration::from_millis(2500)).await;
    manager.remove_download_callback("m");

    let reply = task.await.unwrap();
    assert!(reply.contains("hi"));
    assert_eq!(*seen.lock().unwrap(), vec![0, 10]);
    assert_eq!(manager.get_status("m"), SessionStatus::Ready);
}

#[tokio::test]
async fn test_reset_error_after_failed_load() {
    let manager = manager_with(
        Arc::new(SimulatedTextLoader::new().failing_next(1)),
        Arc::new(SimulatedImageLoader::new()),
    );

    manager.generate_text("m", "hi").await;
    assert!(matches!(manager.model_state("m"), ModelState::Error { .. }));

    assert!(manager.reset_error("m"));
    assert_eq!(manager.model_state("m"), ModelState::Available);
    assert!(!manager.reset_error("m"));
}

#[tokio::test]
async fn test_lru_limit_evicts_oldest() {
    let text = Arc::new(SimulatedTextLoader::new());
    let text_loader: Arc<dyn TextEngineLoader> = text.clone();
    let manager = ModelSessionManager::builder(text_loader, Arc::new(SimulatedImageLoader::new()))
        .max_resident(Some(2))
        .probe(cpu_probe())
        .build()
        .unwrap();

    manager.generate_text("a", "hi").await;
    manager.generate_text("b", "hi").await;
    manager.generate_text("a", "hi").await;
    manager.generate_text("c", "hi").await;

    assert_eq!(manager.resident_models(Modality::Text), vec!["a", "c"]);
    assert_eq!(manager.get_status("b"), SessionStatus::NotLoaded);
    assert_eq!(manager.model_state("b"), ModelState::Available);
    assert_eq!(manager.metrics().resident(Modality::Text), 2);

    // Evicted model loads again on demand
    manager.generate_text("b", "hi").await;
    assert_eq!(text.load_count(), 4);
}

#[tokio::test]
async fn test_accelerated_support_is_cached() {
    let manager = ModelSessionManager::builder(
        Arc::new(SimulatedTextLoader::new()),
        Arc::new(SimulatedImageLoader::new()),
    )
    .probe(CapabilityProbe::new(Arc::new(FixedAdapter(Some(AdapterInfo {
        backend: "metal".to_string(),
        device: "test".to_string(),
    })))))
    .build()
    .unwrap();

    assert!(manager.check_accelerated_support().await);
    assert!(manager.check_accelerated_support().await);
    // Probe result never gates loading
    assert!(manager.generate_text("m", "hi").await.contains("hi"));
}

#[tokio::test]
async fn test_end_to_end_chat_and_image() {
    let text = Arc::new(SimulatedTextLoader::new());
    let image = Arc::new(SimulatedImageLoader::new());
    let manager = manager_with(text.clone(), image.clone());

    let (text_progress, text_cb) = recorder();
    let (image_progress, image_cb) = recorder();
    manager.set_download_callback("GPT-4o-mini", text_cb);
    manager.set_download_callback("FLUX.1-dev", image_cb);

    let reply = manager.generate_text("GPT-4o-mini", "Tell me a joke").await;
    assert!(reply.contains("Tell me a joke"));

    let url = manager.generate_image("FLUX.1-dev", "a lighthouse").await.unwrap();
    assert!(url.starts_with(PNG_DATA_URL_PREFIX));

    let full: Vec<u8> = (0..=100).step_by(10).collect();
    assert_eq!(*text_progress.lock().unwrap(), full);
    assert_eq!(*image_progress.lock().unwrap(), full);

    manager.generate_text("GPT-4o-mini", "another").await;
    manager.generate_image("FLUX.1-dev", "another").await.unwrap();
    assert_eq!(text.load_count(), 1);
    assert_eq!(image.load_count(), 1);

    let states: Vec<_> = manager
        .model_snapshots()
        .into_iter()
        .map(|s| (s.model_id, s.state))
        .collect();
    assert_eq!(
        states,
        vec![
            ("FLUX.1-dev".to_string(), ModelState::Ready),
            ("GPT-4o-mini".to_string(), ModelState::Ready),
        ]
    );

    let exposition = manager.metrics().render().unwrap();
    assert!(exposition.contains("neural_platform_generations_total"));
}
