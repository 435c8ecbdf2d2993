//! Stream assembly for the three delivery modes.
//!
//! Synthesis is the only slow stage, so it runs on a blocking thread and
//! feeds frames through a small bounded channel; quantization, framing and
//! transcoding happen inline as each frame is pulled. The channel bound is
//! the backpressure contract: the engine can never run more than a few
//! frames ahead of what the transport has accepted, and dropping the
//! consumer closes the channel and stops synthesis promptly.

use std::sync::Arc;

use async_stream::try_stream;
use futures_core::Stream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::AudioError;
use crate::mp3::{ChunkTranscoder, Mp3Transcoder};
use crate::{pcm, wav, FrameSink, SpeechEngine, StreamRequest};

/// Upper bound on frames buffered ahead of the transport.
const FRAME_CHANNEL_CAPACITY: usize = 8;

type FrameReceiver = mpsc::Receiver<Result<Vec<f32>, AudioError>>;

/// Run the engine for one request on a blocking thread, returning the pull
/// side of the frame channel. A terminal engine error arrives as the last
/// item; normal completion just closes the channel.
fn spawn_synthesis(engine: Arc<dyn SpeechEngine>, request: StreamRequest) -> FrameReceiver {
    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    tokio::task::spawn_blocking(move || {
        let sink = FrameSink::new(tx.clone());
        if let Err(e) = engine.synthesize(&request, &sink) {
            debug!("synthesis ended with error: {e}");
            // The receiver may already be gone; nothing more to do then.
            let _ = tx.blocking_send(Err(e));
        }
    });
    rx
}

/// Full-file mode: drain every frame, then emit one finite WAV blob.
///
/// Blocks (asynchronously) until the whole utterance is synthesized; the
/// streaming modes below are the low-latency paths.
pub async fn render_complete(
    engine: Arc<dyn SpeechEngine>,
    request: StreamRequest,
) -> Result<Vec<u8>, AudioError> {
    request.validate()?;
    let mut frames = spawn_synthesis(engine, request);
    let mut samples: Vec<i16> = Vec::new();
    while let Some(frame) = frames.recv().await {
        samples.extend(pcm::quantize_frame(&frame?));
    }
    wav::write_wav(&samples)
}

/// Streaming WAV mode: the unbounded-length header first, then each
/// frame's raw PCM bytes in arrival order. No trailer is written; the
/// stream simply ends, so the container never learns its true length.
pub fn stream_pcm(
    engine: Arc<dyn SpeechEngine>,
    request: StreamRequest,
) -> Result<impl Stream<Item = Result<Vec<u8>, AudioError>>, AudioError> {
    request.validate()?;
    let mut frames = spawn_synthesis(engine, request);
    Ok(try_stream! {
        yield wav::streaming_header().to_vec();
        while let Some(frame) = frames.recv().await {
            let chunk = pcm::quantize_frame(&frame?);
            if chunk.is_empty() {
                continue;
            }
            yield pcm::pcm_bytes(&chunk);
        }
    })
}

/// Streaming MP3 mode with the default LAME transcoder.
pub fn stream_mp3(
    engine: Arc<dyn SpeechEngine>,
    request: StreamRequest,
) -> Result<impl Stream<Item = Result<Vec<u8>, AudioError>>, AudioError> {
    stream_encoded(engine, request, Mp3Transcoder::default())
}

/// Streaming compressed mode: no container header, one encoded unit per
/// frame. Generic over the transcoder so a stateful encoder can be
/// substituted without changing the assembly.
pub fn stream_encoded<T>(
    engine: Arc<dyn SpeechEngine>,
    request: StreamRequest,
    transcoder: T,
) -> Result<impl Stream<Item = Result<Vec<u8>, AudioError>>, AudioError>
where
    T: ChunkTranscoder + 'static,
{
    request.validate()?;
    let mut frames = spawn_synthesis(engine, request);
    Ok(try_stream! {
        while let Some(frame) = frames.recv().await {
            let chunk = pcm::quantize_frame(&frame?);
            if chunk.is_empty() {
                continue;
            }
            yield transcoder.transcode(&chunk)?;
        }
    })
}
