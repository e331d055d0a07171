//! Signed texture values and the adapters that build them from external
//! representations (raw strings, session server JSON, game profile properties).

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use url::Url;

/// Name of the game profile property that carries the signed textures.
pub const TEXTURES_PROPERTY: &str = "textures";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("missing or non-string field `{0}`")]
    MissingField(&'static str),
    #[error("property `{0}` carries no signature")]
    Unsigned(String),
    #[error("texture value is not valid base64: {0}")]
    InvalidBase64(String),
    #[error("texture value is not a valid textures document: {0}")]
    InvalidDocument(String),
}

/// An encoded texture blob plus the signature over it.
///
/// Two payloads are equal iff both fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TexturePayload {
    texture: String,
    signature: String,
}

impl TexturePayload {
    pub fn new(texture: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            texture: texture.into(),
            signature: signature.into(),
        }
    }

    /// Build from a JSON object with `value` and `signature` string fields,
    /// as found in the session server's `properties` array.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, PayloadError> {
        let texture = value
            .get("value")
            .and_then(serde_json::Value::as_str)
            .ok_or(PayloadError::MissingField("value"))?;
        let signature = value
            .get("signature")
            .and_then(serde_json::Value::as_str)
            .ok_or(PayloadError::MissingField("signature"))?;
        Ok(Self::new(texture, signature))
    }

    pub fn texture(&self) -> &str {
        &self.texture
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Decode the base64 texture blob into its textures document.
    pub fn decode(&self) -> Result<TexturesDocument, PayloadError> {
        let bytes = STANDARD
            .decode(self.texture.as_bytes())
            .map_err(|e| PayloadError::InvalidBase64(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| PayloadError::InvalidDocument(e.to_string()))
    }
}

/// A game profile property as handed over by the host runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureProperty {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl TryFrom<TextureProperty> for TexturePayload {
    type Error = PayloadError;

    fn try_from(property: TextureProperty) -> Result<Self, Self::Error> {
        match property.signature {
            Some(signature) => Ok(Self::new(property.value, signature)),
            None => Err(PayloadError::Unsigned(property.name)),
        }
    }
}

impl From<&TexturePayload> for TextureProperty {
    fn from(payload: &TexturePayload) -> Self {
        Self {
            name: TEXTURES_PROPERTY.to_string(),
            value: payload.texture.clone(),
            signature: Some(payload.signature.clone()),
        }
    }
}

/// The JSON document encoded inside a texture value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TexturesDocument {
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub profile_id: String,
    #[serde(default)]
    pub profile_name: String,
    #[serde(default)]
    pub signature_required: bool,
    #[serde(default)]
    pub textures: Textures,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Textures {
    #[serde(rename = "SKIN", default, skip_serializing_if = "Option::is_none")]
    pub skin: Option<SkinTexture>,
    #[serde(rename = "CAPE", default, skip_serializing_if = "Option::is_none")]
    pub cape: Option<CapeTexture>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinTexture {
    pub url: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SkinMetadata>,
}

impl SkinTexture {
    pub fn model(&self) -> SkinModel {
        match self.metadata.as_ref().and_then(|m| m.model.as_deref()) {
            Some("slim") => SkinModel::Slim,
            _ => SkinModel::Classic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkinModel {
    Classic,
    Slim,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapeTexture {
    pub url: Url,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encoded_document() -> String {
        let doc = json!({
            "timestamp": 1_700_000_000_000u64,
            "profileId": "069a79f444e94726a5befca90e38aaf5",
            "profileName": "Notch",
            "signatureRequired": true,
            "textures": {
                "SKIN": {
                    "url": "http://textures.minecraft.net/texture/abc",
                    "metadata": { "model": "slim" }
                }
            }
        });
        STANDARD.encode(doc.to_string())
    }

    #[test]
    fn from_json_reads_value_and_signature() {
        let value = json!({ "name": "textures", "value": "tex1", "signature": "sig1" });
        let payload = TexturePayload::from_json(&value).unwrap();
        assert_eq!(payload, TexturePayload::new("tex1", "sig1"));
    }

    #[test]
    fn from_json_missing_signature() {
        let value = json!({ "name": "textures", "value": "tex1" });
        let err = TexturePayload::from_json(&value).unwrap_err();
        assert_eq!(err, PayloadError::MissingField("signature"));
    }

    #[test]
    fn property_without_signature_is_rejected() {
        let property = TextureProperty {
            name: TEXTURES_PROPERTY.to_string(),
            value: "tex1".to_string(),
            signature: None,
        };
        let err = TexturePayload::try_from(property).unwrap_err();
        assert!(matches!(err, PayloadError::Unsigned(_)));
    }

    #[test]
    fn property_conversion_both_ways() {
        let payload = TexturePayload::new("tex1", "sig1");
        let property = TextureProperty::from(&payload);
        assert_eq!(property.name, "textures");
        assert_eq!(TexturePayload::try_from(property).unwrap(), payload);
    }

    #[test]
    fn payload_equality_needs_both_fields() {
        assert_ne!(
            TexturePayload::new("tex1", "sig1"),
            TexturePayload::new("tex1", "sig2")
        );
    }

    #[test]
    fn decode_textures_document() {
        let payload = TexturePayload::new(encoded_document(), "sig");
        let doc = payload.decode().unwrap();
        assert_eq!(doc.profile_name, "Notch");
        assert!(doc.signature_required);
        let skin = doc.textures.skin.unwrap();
        assert_eq!(skin.model(), SkinModel::Slim);
        assert!(doc.textures.cape.is_none());
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = TexturePayload::new("%%%", "sig").decode().unwrap_err();
        assert!(matches!(err, PayloadError::InvalidBase64(_)));

        let not_json = STANDARD.encode("not json");
        let err = TexturePayload::new(not_json, "sig").decode().unwrap_err();
        assert!(matches!(err, PayloadError::InvalidDocument(_)));
    }
}
