use std::io::Cursor;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Derive the playable duration of a finalized artifact.
///
/// Loads the encoded bytes into a transient decode probe. Probe failure is
/// non-fatal by contract: it must not block finalization, so any error
/// resolves to 0.0.
pub fn duration_seconds(bytes: &[u8], mime_type: &str) -> f64 {
    match try_probe(bytes.to_vec(), mime_type) {
        Some(duration) => {
            debug!("Decode probe: {:.2}s ({})", duration, mime_type);
            duration
        }
        None => {
            warn!("Decode probe failed for {}, duration defaults to 0", mime_type);
            0.0
        }
    }
}

fn try_probe(bytes: Vec<u8>, mime_type: &str) -> Option<f64> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    hint.mime_type(mime_type);

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;

    let track = probed.format.default_track()?;
    let params = &track.codec_params;

    let n_frames = params.n_frames?;
    let sample_rate = params.sample_rate?;

    if sample_rate == 0 {
        return None;
    }

    Some(n_frames as f64 / sample_rate as f64)
}
