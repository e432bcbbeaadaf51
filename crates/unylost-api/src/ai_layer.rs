//! HTTP client for the AI Layer, the service that keeps the image/text
//! embeddings and answers similarity queries.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::{
    Client, RequestBuilder,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::config::Config;
use crate::storage::StoredFile;

pub const IMAGE_THRESHOLD: f64 = 0.3;
pub const TEXT_THRESHOLD: f64 = 0.2;

/// One similarity hit. `id` is the AI Layer's document id; anything else the
/// service reports is passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
struct MatchList {
    #[serde(default)]
    matches: Vec<Match>,
}

/// An image to forward, read from the upload directory.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: &'static str,
    pub data: Vec<u8>,
}

impl ImageUpload {
    /// Reads a stored upload back for forwarding.
    pub async fn read(file: &StoredFile) -> Result<Self> {
        let data = tokio::fs::read(&file.path)
            .await
            .with_context(|| format!("reading upload {}", file.path.display()))?;
        Ok(Self {
            file_name: file.original_name.clone(),
            content_type: file.content_type,
            data,
        })
    }

    pub async fn read_all(files: &[StoredFile]) -> Result<Vec<Self>> {
        let mut uploads = Vec::with_capacity(files.len());
        for file in files {
            uploads.push(Self::read(file).await?);
        }
        Ok(uploads)
    }

    fn part(&self) -> Result<Part> {
        Ok(Part::bytes(self.data.clone())
            .file_name(self.file_name.clone())
            .mime_str(self.content_type)?)
    }
}

#[derive(Debug, Deserialize)]
struct RegistrationBody {
    item_id: Option<String>,
    image_url: Option<String>,
    #[serde(default)]
    additional_images: Vec<String>,
    #[serde(default)]
    matches: Vec<Match>,
}

/// What the AI Layer returns after indexing an item.
#[derive(Debug, Clone)]
pub struct Registration {
    pub item_id: String,
    pub image_url: Option<String>,
    pub additional_images: Vec<String>,
    /// Candidate counterparts, only reported for lost items.
    pub matches: Vec<Match>,
}

impl TryFrom<RegistrationBody> for Registration {
    type Error = anyhow::Error;

    fn try_from(body: RegistrationBody) -> Result<Self> {
        let item_id = body
            .item_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("No item_id returned from AI Layer"))?;
        Ok(Registration {
            item_id,
            image_url: body.image_url,
            additional_images: body.additional_images,
            matches: body.matches,
        })
    }
}

pub struct FoundItemDocument<'a> {
    pub item_name: &'a str,
    pub description: &'a str,
    pub location: &'a str,
    pub category: &'a str,
    pub reporter_id: i64,
}

pub struct LostItemDocument<'a> {
    pub item_name: &'a str,
    pub description: &'a str,
    pub last_seen_location: &'a str,
    pub category: &'a str,
    pub date_lost: &'a str,
    pub owner_id: i64,
    pub reward: &'a str,
    pub status: &'a str,
    pub local_id: i64,
    /// Remote image reference, sent with text-only registrations.
    pub image_url: Option<&'a str>,
}

impl LostItemDocument<'_> {
    fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("item_name", self.item_name.to_string()),
            ("description", self.description.to_string()),
            ("last_seen_location", self.last_seen_location.to_string()),
            ("category", self.category.to_string()),
            ("date_lost", self.date_lost.to_string()),
            ("owner_id", self.owner_id.to_string()),
            ("reward", self.reward.to_string()),
            ("status", self.status.to_string()),
            ("mysql_id", self.local_id.to_string()),
        ];
        if let Some(url) = self.image_url {
            fields.push(("image_url", url.to_string()));
        }
        fields
    }
}

pub struct AiLayer {
    client: Client,
    base_url: String,
    match_timeout: Duration,
}

impl AiLayer {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            base_url: config.ai_layer_url.clone(),
            match_timeout: config.ai_match_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // -- Found items --

    pub async fn add_found_item(
        &self,
        doc: &FoundItemDocument<'_>,
        files: &[ImageUpload],
    ) -> Result<Registration> {
        let mut form = Form::new()
            .text("item_name", doc.item_name.to_string())
            .text("description", doc.description.to_string())
            .text("location", doc.location.to_string())
            .text("category", doc.category.to_string())
            .text("reporter_id", doc.reporter_id.to_string());
        for file in files {
            form = form.part("files", file.part()?);
        }

        let body: RegistrationBody = send_json(
            self.client.post(self.url("/image-matcher/add-found-item")).multipart(form),
            "add-found-item",
        )
        .await?;
        body.try_into()
    }

    pub async fn update_item(&self, firestore_id: &str, fields: &Value) -> Result<()> {
        send(
            self.client
                .put(self.url(&format!("/image-matcher/items/{}", firestore_id)))
                .json(fields),
            "update item",
        )
        .await
    }

    pub async fn delete_item(&self, firestore_id: &str) -> Result<()> {
        send(
            self.client.delete(self.url(&format!("/image-matcher/items/{}", firestore_id))),
            "delete item",
        )
        .await
    }

    pub async fn update_item_status(&self, firestore_id: &str, status: &str) -> Result<()> {
        send(
            self.client
                .put(self.url(&format!("/image-matcher/items/{}/status", firestore_id)))
                .json(&json!({ "status": status })),
            "update item status",
        )
        .await
    }

    /// Uploads additional images and returns their remote URLs.
    pub async fn add_item_images(&self, firestore_id: &str, files: &[ImageUpload]) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct Added {
            #[serde(default)]
            image_urls: Vec<String>,
        }

        let mut form = Form::new();
        for file in files {
            form = form.part("files", file.part()?);
        }
        let added: Added = send_json(
            self.client
                .post(self.url(&format!("/image-matcher/items/{}/images", firestore_id)))
                .multipart(form),
            "add item images",
        )
        .await?;
        Ok(added.image_urls)
    }

    pub async fn delete_item_image(&self, firestore_id: &str, image_url: &str) -> Result<()> {
        send(
            self.client
                .delete(self.url(&format!("/image-matcher/items/{}/images", firestore_id)))
                .json(&json!({ "image_url": image_url })),
            "delete item image",
        )
        .await
    }

    pub async fn set_primary_image(&self, firestore_id: &str, image_url: &str) -> Result<()> {
        send(
            self.client
                .put(self.url(&format!("/image-matcher/items/{}/primary-image", firestore_id)))
                .json(&json!({ "image_url": image_url })),
            "set primary image",
        )
        .await
    }

    // -- Matching --

    pub async fn hybrid_search(&self, query: &str, image_url: &str) -> Result<Vec<Match>> {
        let req = self.client.get(self.url("/hybrid-matcher/search")).query(&[
            ("q", query.to_string()),
            ("image_url", image_url.to_string()),
            ("image_threshold", IMAGE_THRESHOLD.to_string()),
            ("text_threshold", TEXT_THRESHOLD.to_string()),
        ]);
        self.matches(req, "hybrid search").await
    }

    /// Text similarity search, optionally restricted to one collection.
    pub async fn text_search(&self, query: &str, collection: Option<&str>) -> Result<Vec<Match>> {
        let mut params = vec![("q", query.to_string()), ("threshold", TEXT_THRESHOLD.to_string())];
        if let Some(c) = collection {
            params.push(("collection", c.to_string()));
        }
        let req = self.client.get(self.url("/text-matcher/search")).query(&params);
        self.matches(req, "text search").await
    }

    /// Matches a stored lost item by its description and image reference.
    pub async fn match_item(&self, query: Option<&str>, image_url: Option<&str>) -> Result<Vec<Match>> {
        let req = self.client.post(self.url("/hybrid-matcher/match")).json(&json!({
            "query": query,
            "image_url": image_url,
            "image_threshold": IMAGE_THRESHOLD,
            "text_threshold": TEXT_THRESHOLD,
        }));
        self.matches(req, "hybrid match").await
    }

    /// Matches an uploaded photo, plus an optional description, against the
    /// found-item collection.
    pub async fn match_image(&self, query: Option<&str>, file: &ImageUpload) -> Result<Vec<Match>> {
        let mut form = Form::new();
        if let Some(q) = query {
            form = form.text("query", q.to_string());
        }
        form = form.part("file", file.part()?);
        let req = self
            .client
            .post(self.url("/hybrid-matcher/match"))
            .query(&[("collection", "found_items")])
            .multipart(form);
        self.matches(req, "hybrid image match").await
    }

    async fn matches(&self, req: RequestBuilder, endpoint: &str) -> Result<Vec<Match>> {
        let list: MatchList = send_json(req.timeout(self.match_timeout), endpoint).await?;
        debug!("AI Layer {} returned {} matches", endpoint, list.matches.len());
        Ok(list.matches)
    }

    // -- Lost items --

    pub async fn add_lost_item(&self, doc: &LostItemDocument<'_>, file: &ImageUpload) -> Result<Registration> {
        let mut form = Form::new();
        for (key, value) in doc.fields() {
            form = form.text(key, value);
        }
        form = form.part("file", file.part()?);
        let body: RegistrationBody = send_json(
            self.client.post(self.url("/lost-items/add")).multipart(form),
            "add lost item",
        )
        .await?;
        body.try_into()
    }

    pub async fn add_lost_item_text(&self, doc: &LostItemDocument<'_>) -> Result<Registration> {
        let payload: Map<String, Value> = doc
            .fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::String(v)))
            .collect();
        let body: RegistrationBody = send_json(
            self.client.post(self.url("/lost-items/add-text")).json(&payload),
            "add lost item (text)",
        )
        .await?;
        body.try_into()
    }
}

async fn send(req: RequestBuilder, endpoint: &str) -> Result<()> {
    let resp = req
        .send()
        .await
        .with_context(|| format!("AI Layer {} unreachable", endpoint))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("AI Layer {} failed ({}): {}", endpoint, status, body);
    }
    Ok(())
}

async fn send_json<T: DeserializeOwned>(req: RequestBuilder, endpoint: &str) -> Result<T> {
    let resp = req
        .send()
        .await
        .with_context(|| format!("AI Layer {} unreachable", endpoint))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("AI Layer {} failed ({}): {}", endpoint, status, body);
    }
    resp.json::<T>()
        .await
        .with_context(|| format!("AI Layer {} returned an unreadable body", endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_requires_item_id() {
        let body: RegistrationBody = serde_json::from_str(r#"{"image_url": "https://x/y.jpg"}"#).unwrap();
        let err = Registration::try_from(body).unwrap_err();
        assert!(err.to_string().contains("item_id"));

        let body: RegistrationBody = serde_json::from_str(
            r#"{"item_id": "abc", "image_url": "https://x/1.jpg", "additional_images": ["https://x/2.jpg"]}"#,
        )
        .unwrap();
        let reg = Registration::try_from(body).unwrap();
        assert_eq!(reg.item_id, "abc");
        assert_eq!(reg.additional_images.len(), 1);
        assert!(reg.matches.is_empty());
    }

    #[test]
    fn test_match_keeps_unknown_fields() {
        let m: Match = serde_json::from_str(
            r#"{"id": "doc1", "score": 0.82, "match_type": "hybrid", "item_name": "Wallet"}"#,
        )
        .unwrap();
        assert_eq!(m.id.as_deref(), Some("doc1"));
        assert_eq!(m.extra["item_name"], "Wallet");

        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["item_name"], "Wallet");
        assert_eq!(v["score"], 0.82);
    }

    #[test]
    fn test_lost_document_fields() {
        let doc = LostItemDocument {
            item_name: "Umbrella",
            description: "",
            last_seen_location: "Library",
            category: "Misc",
            date_lost: "2024-05-02",
            owner_id: 4,
            reward: "",
            status: "active",
            local_id: 9,
            image_url: Some("https://cdn/x.jpg"),
        };
        let fields = doc.fields();
        assert!(fields.contains(&("mysql_id", "9".to_string())));
        assert!(fields.contains(&("owner_id", "4".to_string())));
        assert_eq!(fields.last().unwrap().0, "image_url");
    }
}
