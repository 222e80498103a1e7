//! Voice input upload
//!
//! Recorded speech is encoded as 16-bit mono WAV and posted as the multipart
//! field `audio`; the server answers with the recognized text in `data`.

use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

use crate::config::AudioConfig;
use crate::error::{Error, Result};

/// Speech-to-text upload client
#[derive(Debug, Clone)]
pub struct VoiceInputClient {
    client: reqwest::Client,
    url: String,
    auth_header: String,
    token: Option<String>,
}

impl VoiceInputClient {
    /// Client posting to `base_url` + `config.voice_input_path`
    #[must_use]
    pub fn new(
        base_url: &str,
        config: &AudioConfig,
        auth_header: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}{}", base_url.trim_end_matches('/'), config.voice_input_path),
            auth_header: auth_header.into(),
            token,
        }
    }

    /// Upload endpoint
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Upload WAV audio and return the recognized text
    pub async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        let bytes = wav.len();
        let part = Part::bytes(wav)
            .file_name("voice.wav")
            .mime_str("audio/wav")?;
        let form = Form::new().part("audio", part);

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(token) = &self.token {
            request = request.header(self.auth_header.as_str(), token.as_str());
        }

        debug!(url = %self.url, bytes, "Uploading voice input");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!("voice input HTTP {}", status)));
        }

        let body: serde_json::Value = response.json().await?;
        let text = recognized_text(&body)?;
        info!(chars = text.chars().count(), "Voice input recognized");
        Ok(text)
    }
}

fn recognized_text(body: &serde_json::Value) -> Result<String> {
    body.get("data")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Network("voice input reply has no text".to_string()))
}

/// Encode mono `f32` samples as 16-bit PCM WAV
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::AudioStream(format!("Failed to create WAV writer: {}", e)))?;

        for &sample in samples {
            let amplitude = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer
                .write_sample(amplitude)
                .map_err(|e| Error::AudioStream(format!("Failed to write sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| Error::AudioStream(format!("Failed to finalize WAV: {}", e)))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_to_wav_header() {
        let samples = vec![0.0f32; 1600];
        let wav = samples_to_wav(&samples, 16000).unwrap();

        assert_eq!(wav.len(), 44 + 1600 * 2);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
    }

    #[test]
    fn test_recognized_text() {
        let body = serde_json::json!({ "errorCode": 0, "data": "turn on the lights" });
        assert_eq!(recognized_text(&body).unwrap(), "turn on the lights");

        let empty = serde_json::json!({ "errorCode": 1 });
        assert!(recognized_text(&empty).is_err());
    }

    #[test]
    fn test_upload_url() {
        let client = VoiceInputClient::new(
            "http://host:8080/",
            &AudioConfig::default(),
            "aiflowy-token",
            None,
        );
        assert_eq!(client.url(), "http://host:8080/api/v1/commons/voiceInput");
    }
}
