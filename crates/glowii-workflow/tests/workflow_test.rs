mod helpers;

use std::time::Duration;

use glowii_api_client::{DescribeResponse, SearchResponse, UploadResponse, HealthStatus};
use glowii_compositor::TextPatch;
use glowii_core::{
    Background, Dimensions, ErrorKind, NotificationLevel, ProcessingStep, ServiceMode, Stage,
};
use glowii_workflow::{Outcome, SelectedFile};
use helpers::{
    enhance_response, jpeg_bytes, product_photo, setup, setup_with, Call, Reply,
};

#[tokio::test]
async fn test_oversized_file_is_rejected() {
    let t = setup();
    let file = SelectedFile::new(
        "huge.jpg",
        "image/jpeg",
        vec![0u8; 10 * 1024 * 1024 + 1],
    );

    let err = t.workflow.select_file(file).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(t.workflow.snapshot().stage, Stage::Idle);
    assert!(t.notifier.has_kind(ErrorKind::Validation));
    assert_eq!(
        t.notifier.last().map(|n| n.message),
        Some("File size must be less than 10MB.".to_string())
    );
    assert!(t.api.calls().is_empty());
}

#[tokio::test]
async fn test_non_image_file_is_rejected() {
    let t = setup();
    let file = SelectedFile::new("notes.pdf", "application/pdf", vec![1u8; 128]);

    let err = t.workflow.select_file(file).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(t.workflow.snapshot().stage, Stage::Idle);
    assert!(t.api.calls().is_empty());
}

#[tokio::test]
async fn test_undecodable_image_is_rejected() {
    let t = setup();
    let file = SelectedFile::new("broken.jpg", "image/jpeg", b"not really a jpeg".to_vec());

    let err = t.workflow.select_file(file).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(t.workflow.snapshot().stage, Stage::Idle);
}

#[tokio::test]
async fn test_svg_photo_is_loaded() {
    let t = setup();
    let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10"><rect width="20" height="10" fill="#aa3300"/></svg>"##;

    let outcome = t
        .workflow
        .select_file(SelectedFile::new("p.svg", "image/svg+xml", svg.as_bytes().to_vec()))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Applied);
    let session = t.workflow.snapshot();
    assert_eq!(session.stage, Stage::Loaded);
    assert_eq!(session.original_dimensions, Some(Dimensions::new(20, 10)));
    assert_eq!(t.api.calls(), vec![Call::Upload("p.svg".to_string())]);
}

#[tokio::test]
async fn test_svg_candidate_downloads_as_png() {
    let t = setup();
    let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="30" height="15"><rect width="30" height="15" fill="#00aa00"/></svg>"##;
    let mut response = enhance_response("proc-1", 1, 10, 10);
    response.enhanced_image_1 = Some(format!(
        "data:image/svg+xml;base64,{}",
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, svg)
    ));
    t.api.set_enhance(Reply::Ok(response));

    t.to_finalized(0).await;
    assert_eq!(
        t.workflow.snapshot().options[0].dimensions,
        Dimensions::new(30, 15)
    );

    let path = t.workflow.download().await.unwrap();
    let decoded = image::open(&path).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (30, 15));

    t.workflow.open_compositor().unwrap();
    t.workflow.apply_watermark().unwrap();
}

#[tokio::test]
async fn test_select_file_loads_and_uploads() {
    let t = setup();

    let outcome = t.workflow.select_file(product_photo()).await.unwrap();

    assert_eq!(outcome, Outcome::Applied);
    let session = t.workflow.snapshot();
    assert_eq!(session.stage, Stage::Loaded);
    assert_eq!(session.original_dimensions, Some(Dimensions::new(64, 48)));
    assert_eq!(
        session.uploaded_reference.as_deref(),
        Some("uploads/product.jpg")
    );
    assert_eq!(
        t.messages(),
        vec!["Uploading image...", "Image uploaded successfully!"]
    );
    assert_eq!(t.api.calls(), vec![Call::Upload("product.jpg".to_string())]);
}

#[tokio::test]
async fn test_backend_upload_response_shape_is_accepted() {
    let t = setup();
    t.api.set_upload(Reply::Ok(UploadResponse::Stored {
        file_path: "/srv/uploads/product.jpg".to_string(),
        filename: Some("product.jpg".to_string()),
    }));

    t.workflow.select_file(product_photo()).await.unwrap();

    assert_eq!(
        t.workflow.snapshot().uploaded_reference.as_deref(),
        Some("/srv/uploads/product.jpg")
    );
}

#[tokio::test]
async fn test_upload_failure_keeps_loaded_and_blocks_enhancement() {
    let t = setup();
    t.api.set_upload(Reply::Fail("status 502".to_string()));

    let err = t.workflow.select_file(product_photo()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Remote);

    let session = t.workflow.snapshot();
    assert_eq!(session.stage, Stage::Loaded);
    assert!(session.uploaded_reference.is_none());
    assert!(t.notifier.has_kind(ErrorKind::Remote));

    let err = t.workflow.begin_enhancement().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(t.workflow.snapshot().stage, Stage::Loaded);

    t.api.set_upload(Reply::Ok(UploadResponse::Image {
        image: "uploads/retry.jpg".to_string(),
    }));
    assert_eq!(t.workflow.retry_upload().await.unwrap(), Outcome::Applied);
    assert_eq!(
        t.workflow.snapshot().uploaded_reference.as_deref(),
        Some("uploads/retry.jpg")
    );

    let err = t.workflow.retry_upload().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[tokio::test]
async fn test_begin_enhancement_requires_loaded() {
    let t = setup();

    let err = t.workflow.begin_enhancement().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(t.workflow.snapshot().stage, Stage::Idle);
    assert_eq!(
        t.notifier.last().map(|n| n.level),
        Some(NotificationLevel::Warning)
    );
    assert!(t.api.calls().is_empty());
}

#[tokio::test]
async fn test_enhance_select_finalize_scenario() {
    let t = setup();
    t.workflow.select_file(product_photo()).await.unwrap();

    assert_eq!(
        t.workflow.begin_enhancement().await.unwrap(),
        Outcome::Applied
    );

    let session = t.workflow.snapshot();
    assert_eq!(session.stage, Stage::Selecting);
    assert_eq!(session.processing_step, ProcessingStep::NotStarted);
    assert_eq!(session.options.len(), 3);
    assert!(session
        .options
        .iter()
        .all(|o| o.dimensions == Dimensions::new(1000, 1004)));
    assert_eq!(session.processor_id.as_deref(), Some("proc-1"));
    assert!(session.check_invariants().is_ok());

    assert_eq!(t.workflow.select_option(2).await.unwrap(), Outcome::Applied);

    let session = t.workflow.snapshot();
    assert_eq!(session.stage, Stage::Finalized);
    assert_eq!(session.selected_option_index, Some(2));
    assert_eq!(session.enhanced_image.as_ref(), Some(&session.options[2]));
    assert_eq!(session.generated_title, "T");
    assert_eq!(session.generated_description, "D");
    assert!(session.check_invariants().is_ok());
    assert!(t
        .api
        .calls()
        .contains(&Call::Describe("proc-1".to_string(), 3)));
}

#[tokio::test]
async fn test_enhance_request_carries_reference_and_background() {
    let t = setup();
    t.workflow.set_background_color("black").unwrap();
    t.to_selecting().await;

    let request = t
        .api
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::Enhance(request) => Some(request),
            _ => None,
        })
        .unwrap();
    assert_eq!(request.image_path, "uploads/product.jpg");
    assert_eq!(request.background.as_deref(), Some("black"));
}

#[tokio::test]
async fn test_enhance_failure_reverts_to_loaded() {
    let t = setup();
    t.api.set_enhance(Reply::Fail("Error enhancing image".to_string()));
    t.workflow.select_file(product_photo()).await.unwrap();

    let err = t.workflow.begin_enhancement().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Remote);
    let session = t.workflow.snapshot();
    assert_eq!(session.stage, Stage::Loaded);
    assert!(session.options.is_empty());
    assert_eq!(session.processing_step, ProcessingStep::NotStarted);
    assert!(session.processor_id.is_none());
    assert!(t.notifier.has_kind(ErrorKind::Remote));

    // The user can retry once the service recovers.
    t.api
        .set_enhance(Reply::Ok(enhance_response("proc-2", 3, 40, 40)));
    t.workflow.begin_enhancement().await.unwrap();
    assert_eq!(t.workflow.snapshot().stage, Stage::Selecting);
}

#[tokio::test]
async fn test_undecodable_candidates_are_skipped() {
    let t = setup();
    let mut response = enhance_response("proc-1", 3, 30, 20);
    response.enhanced_image_2 = Some("data:image/jpeg;base64,AAAA".to_string());
    t.api.set_enhance(Reply::Ok(response));

    t.to_selecting().await;

    let session = t.workflow.snapshot();
    assert_eq!(session.options.len(), 2);
    let numbers: Vec<u32> = session.options.iter().map(|o| o.option_number).collect();
    assert_eq!(numbers, vec![1, 3]);

    t.workflow.select_option(1).await.unwrap();
    assert!(t
        .api
        .calls()
        .contains(&Call::Describe("proc-1".to_string(), 3)));
}

#[tokio::test]
async fn test_no_usable_candidates_is_remote_error() {
    let t = setup();
    t.api
        .set_enhance(Reply::Ok(enhance_response("proc-9", 0, 1, 1)));
    t.workflow.select_file(product_photo()).await.unwrap();

    let err = t.workflow.begin_enhancement().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Remote);
    assert_eq!(t.workflow.snapshot().stage, Stage::Loaded);
    assert!(t.api.calls().contains(&Call::Cleanup("proc-9".to_string())));
}

#[tokio::test]
async fn test_second_enhancement_while_processing_is_rejected() {
    let t = setup();
    t.workflow.select_file(product_photo()).await.unwrap();
    let gate = t.api.gate_enhance();

    let workflow = t.workflow.clone();
    let run = tokio::spawn(async move { workflow.begin_enhancement().await });

    let mut progress = t.workflow.subscribe();
    progress
        .wait_for(|p| p.step == ProcessingStep::Application)
        .await
        .unwrap();

    let err = t.workflow.begin_enhancement().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(t.workflow.snapshot().stage, Stage::Processing);

    gate.notify_one();
    assert_eq!(run.await.unwrap().unwrap(), Outcome::Applied);
    assert_eq!(
        t.api.count(|c| matches!(c, Call::Enhance(_))),
        1
    );
}

#[tokio::test]
async fn test_processing_steps_are_monotonic() {
    let t = setup_with(|config| config.phase_delay_ms = 10);
    t.workflow.select_file(product_photo()).await.unwrap();

    let mut rx = t.workflow.subscribe();
    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let p = *rx.borrow_and_update();
            seen.push(p);
            if p.stage == Stage::Selecting {
                break;
            }
        }
        seen
    });

    t.workflow.begin_enhancement().await.unwrap();
    let seen = tokio::time::timeout(Duration::from_secs(5), observer)
        .await
        .unwrap()
        .unwrap();

    let steps: Vec<ProcessingStep> = seen
        .iter()
        .filter(|p| p.stage == Stage::Processing)
        .map(|p| p.step)
        .collect();
    assert!(!steps.is_empty());
    assert!(steps.windows(2).all(|w| w[0] <= w[1]), "{:?}", steps);
    assert_eq!(seen.last().map(|p| p.stage), Some(Stage::Selecting));
}

#[tokio::test]
async fn test_reset_during_processing_discards_late_result() {
    let t = setup();
    t.workflow.select_file(product_photo()).await.unwrap();
    let gate = t.api.gate_enhance();

    let workflow = t.workflow.clone();
    let run = tokio::spawn(async move { workflow.begin_enhancement().await });

    let mut progress = t.workflow.subscribe();
    progress
        .wait_for(|p| p.step == ProcessingStep::Application)
        .await
        .unwrap();

    t.workflow.reset().await;
    gate.notify_one();

    assert_eq!(run.await.unwrap().unwrap(), Outcome::Discarded);
    let session = t.workflow.snapshot();
    assert_eq!(session.stage, Stage::Idle);
    assert!(session.options.is_empty());
    assert!(session.processor_id.is_none());
    // The abandoned run's processor is released.
    assert!(t.api.calls().contains(&Call::Cleanup("proc-1".to_string())));
}

#[tokio::test]
async fn test_select_option_out_of_range() {
    let t = setup();
    t.to_selecting().await;

    let err = t.workflow.select_option(3).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Precondition);
    let session = t.workflow.snapshot();
    assert_eq!(session.stage, Stage::Selecting);
    assert!(session.selected_option_index.is_none());
}

#[tokio::test]
async fn test_select_option_requires_selecting() {
    let t = setup();
    t.workflow.select_file(product_photo()).await.unwrap();

    let err = t.workflow.select_option(0).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(t.workflow.snapshot().stage, Stage::Loaded);
}

#[tokio::test]
async fn test_describe_failure_still_finalizes() {
    let t = setup();
    t.api.set_describe(Reply::Fail("gemini unavailable".to_string()));

    t.to_finalized(0).await;

    let session = t.workflow.snapshot();
    assert_eq!(session.stage, Stage::Finalized);
    assert!(session.generated_title.is_empty());
    assert!(session.generated_description.is_empty());
    assert!(t
        .messages()
        .contains(&"Could not generate a title and description.".to_string()));
}

#[tokio::test]
async fn test_plain_text_description_fallback() {
    let t = setup();
    t.api.set_describe(Reply::Ok(DescribeResponse {
        description: Some("plain text".to_string()),
        option_number: Some(1),
    }));

    t.to_finalized(0).await;

    let session = t.workflow.snapshot();
    assert_eq!(session.generated_description, "plain text");
    assert!(session.generated_title.is_empty());
}

#[tokio::test]
async fn test_fenced_description_with_features() {
    let t = setup();
    t.api.set_describe(Reply::Ok(DescribeResponse {
        description: Some(
            "```json\n{\"title\":\"Desk Lamp\",\"description\":\"Warm light\",\"features\":[\"LED\"],\"tags\":[\"home\",\"office\"]}\n```"
                .to_string(),
        ),
        option_number: Some(1),
    }));

    t.to_finalized(0).await;

    let session = t.workflow.snapshot();
    assert_eq!(session.generated_title, "Desk Lamp");
    assert_eq!(session.generated_features, vec!["LED".to_string()]);
    assert_eq!(session.generated_tags.len(), 2);
}

#[tokio::test]
async fn test_copy_generation_disabled_skips_describe() {
    let t = setup();
    t.workflow.set_copy_generation(false, false).unwrap();

    t.to_finalized(1).await;

    assert_eq!(t.workflow.snapshot().stage, Stage::Finalized);
    assert_eq!(t.api.count(|c| matches!(c, Call::Describe(..))), 0);
}

#[tokio::test]
async fn test_title_only_generation_keeps_description_empty() {
    let t = setup();
    t.workflow.set_copy_generation(true, false).unwrap();

    t.to_finalized(0).await;

    let session = t.workflow.snapshot();
    assert_eq!(session.generated_title, "T");
    assert!(session.generated_description.is_empty());
}

#[tokio::test]
async fn test_reset_from_finalized() {
    let t = setup();
    t.workflow.set_background_color("black").unwrap();
    t.to_finalized(1).await;

    t.workflow.reset().await;

    let session = t.workflow.snapshot();
    assert_eq!(session.stage, Stage::Idle);
    assert!(session.options.is_empty());
    assert!(session.selected_option_index.is_none());
    assert!(session.enhanced_image.is_none());
    assert!(session.generated_title.is_empty());
    assert!(session.generated_description.is_empty());
    assert!(session.uploaded_reference.is_none());
    assert_eq!(
        session.settings.background,
        Background::Color("black".to_string())
    );
    assert!(t.api.calls().contains(&Call::Cleanup("proc-1".to_string())));
    assert!(session.check_invariants().is_ok());
}

#[tokio::test]
async fn test_reset_ignores_cleanup_failure() {
    let t = setup();
    *t.api.cleanup.lock().unwrap() = Reply::Fail("gone".to_string());
    t.to_selecting().await;

    t.workflow.reset().await;

    assert_eq!(t.workflow.snapshot().stage, Stage::Idle);
}

#[tokio::test]
async fn test_reset_from_idle_is_noop_on_remote() {
    let t = setup();
    let before = t.workflow.progress().generation;

    t.workflow.reset().await;

    assert_eq!(t.workflow.snapshot().stage, Stage::Idle);
    assert_eq!(t.workflow.progress().generation, before + 1);
    assert!(t.api.calls().is_empty());
}

#[tokio::test]
async fn test_download_requires_enhanced_image() {
    let t = setup();
    t.to_selecting().await;

    let err = t.workflow.download().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[tokio::test]
async fn test_download_writes_png() {
    let t = setup();
    t.to_finalized(0).await;

    let path = t.workflow.download().await.unwrap();

    let name = path.file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("enhanced_image_") && name.ends_with(".png"), "{}", name);
    let millis = name
        .trim_start_matches("enhanced_image_")
        .trim_end_matches(".png");
    assert!(millis.parse::<i64>().is_ok());

    let written = std::fs::read(&path).unwrap();
    let decoded = image::load_from_memory_with_format(&written, image::ImageFormat::Png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1000, 1004));
    assert_eq!(t.workflow.snapshot().stage, Stage::Finalized);
}

#[tokio::test]
async fn test_search_requires_generated_copy() {
    let t = setup();
    t.workflow.set_copy_generation(false, false).unwrap();
    t.to_finalized(0).await;

    let err = t.workflow.search_similar_products().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(
        t.notifier.last().map(|n| n.level),
        Some(NotificationLevel::Warning)
    );
    assert_eq!(t.api.count(|c| matches!(c, Call::Search(_))), 0);
}

#[tokio::test]
async fn test_search_opens_first_result_by_title() {
    let t = setup();
    t.to_finalized(0).await;

    let url = t.workflow.search_similar_products().await.unwrap();

    assert_eq!(url.as_deref(), Some("https://shop.example/lamp"));
    assert!(t.api.calls().contains(&Call::Search("T".to_string())));
    assert_eq!(
        *t.opener.opened.lock().unwrap(),
        vec!["https://shop.example/lamp".to_string()]
    );
    assert_eq!(
        t.workflow.snapshot().search_result_url.as_deref(),
        Some("https://shop.example/lamp")
    );
}

#[tokio::test]
async fn test_search_falls_back_to_description() {
    let t = setup();
    t.workflow.set_copy_generation(false, true).unwrap();
    t.to_finalized(0).await;

    t.workflow.search_similar_products().await.unwrap();

    assert!(t.api.calls().contains(&Call::Search("D".to_string())));
}

#[tokio::test]
async fn test_search_distinguishes_empty_and_failed() {
    let t = setup();
    t.to_finalized(0).await;

    t.api.set_search(Reply::Ok(SearchResponse::default()));
    assert_eq!(t.workflow.search_similar_products().await.unwrap(), None);
    assert_eq!(
        t.notifier.last().map(|n| n.message),
        Some("No similar products found.".to_string())
    );

    t.api.set_search(Reply::Fail("quota exceeded".to_string()));
    let err = t.workflow.search_similar_products().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Remote);
    assert_eq!(
        t.notifier.last().map(|n| n.message),
        Some("Search failed. Please try again.".to_string())
    );
    assert!(t.opener.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_settings_locked_after_enhancement_starts() {
    let t = setup();
    t.to_selecting().await;

    let err = t.workflow.set_background_color("black").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(
        t.workflow.snapshot().settings.background,
        Background::Color("white".to_string())
    );
}

#[tokio::test]
async fn test_generated_background_is_used_for_enhancement() {
    let t = setup();
    assert_eq!(
        t.workflow.generate_background("marble kitchen counter").await.unwrap(),
        Outcome::Applied
    );
    assert!(matches!(
        t.workflow.snapshot().settings.background,
        Background::Generated { .. }
    ));

    t.to_selecting().await;

    assert!(t.api.calls().iter().any(|c| matches!(
        c,
        Call::Enhance(r) if r.background.as_deref() == Some("https://cdn.example/bg.png")
    )));
}

#[tokio::test]
async fn test_generate_background_requires_prompt() {
    let t = setup();
    let err = t.workflow.generate_background("   ").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert!(t.api.calls().is_empty());
}

#[tokio::test]
async fn test_health_sets_service_mode() {
    let t = setup();
    assert_eq!(t.workflow.check_health().await, ServiceMode::Live);
    assert_eq!(t.workflow.snapshot().service_mode, ServiceMode::Live);

    t.api.set_health(Reply::Fail("connection refused".to_string()));
    assert_eq!(t.workflow.check_health().await, ServiceMode::Offline);

    t.api.set_health(Reply::Ok(HealthStatus {
        status: Some("degraded".to_string()),
        active_processors: None,
    }));
    assert_eq!(t.workflow.check_health().await, ServiceMode::Offline);
}

#[tokio::test]
async fn test_service_mode_survives_reset() {
    let t = setup();
    t.workflow.check_health().await;
    t.workflow.reset().await;
    assert_eq!(t.workflow.snapshot().service_mode, ServiceMode::Live);
}

#[tokio::test]
async fn test_compositor_requires_enhanced_image() {
    let t = setup();
    t.to_selecting().await;

    let err = t.workflow.open_compositor().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);

    let err = t
        .workflow
        .edit_compositor(|c| c.set_text(TextPatch::text("SALE")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[tokio::test]
async fn test_watermark_apply_and_export() {
    let t = setup();
    t.to_finalized(0).await;

    t.workflow.open_compositor().unwrap();
    t.workflow
        .edit_compositor(|c| c.set_text(TextPatch::text("SALE")))
        .unwrap();
    t.workflow.apply_watermark().unwrap();

    let watermarked = t.workflow.snapshot().watermarked_image.unwrap();
    assert_eq!(watermarked.content_type, "image/png");

    let exported = t.workflow.export_watermark(None).await.unwrap();
    assert_eq!(exported.file_name().unwrap(), "watermarked-image.png");

    // Download prefers the watermarked canvas (500x500) over the 1000x1004 option.
    let downloaded = t.workflow.download().await.unwrap();
    let decoded = image::open(&downloaded).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (500, 500));
}

#[tokio::test]
async fn test_compositor_format_error_is_notified() {
    let t = setup();
    t.to_finalized(0).await;
    t.workflow.open_compositor().unwrap();

    let err = t
        .workflow
        .edit_compositor(|c| {
            c.load_vector_overlay(glowii_compositor::OverlaySource::new(
                "logo.png",
                jpeg_bytes(4, 4),
            ))
        })
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Format);
    assert_eq!(
        t.notifier.last().map(|n| n.message),
        Some("Please select an SVG file.".to_string())
    );
}

#[tokio::test]
async fn test_close_and_reset_drop_compositor() {
    let t = setup();
    t.to_finalized(0).await;

    t.workflow.open_compositor().unwrap();
    t.workflow.close_compositor();
    assert!(!t.workflow.is_compositor_open());

    t.workflow.open_compositor().unwrap();
    t.workflow.reset().await;
    assert!(!t.workflow.is_compositor_open());
}

#[tokio::test]
async fn test_last_upload_is_cached() {
    let t = setup();
    assert!(t.workflow.last_cached_upload().await.unwrap().is_none());

    let photo = product_photo();
    t.workflow.select_file(photo.clone()).await.unwrap();

    let (path, bytes) = t.workflow.last_cached_upload().await.unwrap().unwrap();
    assert_eq!(path.file_name().unwrap(), "last_upload.jpg");
    assert_eq!(bytes, photo.bytes);
}

#[tokio::test]
async fn test_new_file_replaces_loaded_session() {
    let t = setup();
    t.workflow.select_file(product_photo()).await.unwrap();
    let first = t.workflow.snapshot().id;

    t.workflow
        .select_file(SelectedFile::new("other.jpg", "image/jpeg", jpeg_bytes(20, 10)))
        .await
        .unwrap();

    let session = t.workflow.snapshot();
    assert_ne!(session.id, first);
    assert_eq!(session.original_dimensions, Some(Dimensions::new(20, 10)));
    assert_eq!(session.original_file_name.as_deref(), Some("other.jpg"));
}

#[tokio::test]
async fn test_select_file_rejected_after_enhancement() {
    let t = setup();
    t.to_selecting().await;

    let err = t.workflow.select_file(product_photo()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(t.workflow.snapshot().stage, Stage::Selecting);
}
