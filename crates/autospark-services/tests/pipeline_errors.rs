use autospark_core::{MixConfig, MixError};
use autospark_services::{AudioIoError, FixedTempo, MixJob, Pipeline, PipelineError};

#[test]
fn missing_vocal_is_unreadable_audio() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pipeline = Pipeline::new(MixConfig::default()).with_estimator(Box::new(FixedTempo(120.0)));
    let job = MixJob::new(
        tmp.path().join("nope.wav"),
        tmp.path().join("nope-inst.wav"),
        tmp.path().join("out.wav"),
    );

    let err = pipeline.run(&job).unwrap_err();
    assert!(matches!(err, PipelineError::Audio(AudioIoError::Unreadable { .. })), "{err}");
    assert!(!tmp.path().join("out.wav").exists());
}

#[test]
fn non_positive_tempo_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let vocal = tmp.path().join("v.wav");
    let inst = tmp.path().join("i.wav");
    let silence = autospark_core::AudioBuffer::silence(1, 4410, 44100);
    autospark_services::write_wav(&vocal, &silence, 16).unwrap();
    autospark_services::write_wav(&inst, &silence, 16).unwrap();

    let mut pipeline = Pipeline::new(MixConfig::default());
    let job = MixJob::new(&vocal, &inst, tmp.path().join("out.wav")).with_bpm(0.0);
    let err = pipeline.run(&job).unwrap_err();
    assert!(matches!(err, PipelineError::Mix(MixError::InvalidTempo(_))));
}
