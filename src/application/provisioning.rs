use std::fs;
use std::path::{Path, PathBuf};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{AzureOpenAiConfig, BlobConfig};
use crate::domain::error::KnowledgeError;

#[derive(Debug, Clone)]
pub struct IndexRestore {
    pub name: String,
    pub schema_path: PathBuf,
    pub data_path: Option<PathBuf>,
}

const SCHEMA_SUFFIX: &str = ".index.json";
const DATA_SUFFIX: &str = ".ndjson";

pub fn find_index_restores(data_dir: &Path) -> Result<Vec<IndexRestore>, KnowledgeError> {
    debug!("Scanning for index definitions in: {}", data_dir.display());
    let mut restores = Vec::new();
    let mut orphans = Vec::new();

    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();

        if let Some(name) = file_name.strip_suffix(SCHEMA_SUFFIX) {
            let data_path = data_dir.join(format!("{}{}", name, DATA_SUFFIX));
            restores.push(IndexRestore {
                name: name.to_string(),
                schema_path: entry.path(),
                data_path: data_path.is_file().then_some(data_path),
            });
        } else if let Some(name) = file_name.strip_suffix(DATA_SUFFIX) {
            if !data_dir.join(format!("{}{}", name, SCHEMA_SUFFIX)).is_file() {
                orphans.push(file_name);
            }
        }
    }

    for orphan in orphans {
        warn!("Skipping data file without an index schema: {}", orphan);
    }

    restores.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("Found {} index definition(s)", restores.len());
    Ok(restores)
}

pub fn knowledge_source_payload(
    name: &str,
    blob: &BlobConfig,
    openai: &AzureOpenAiConfig,
) -> Value {
    let chat_completion_model = if openai.use_verbalization {
        json!({
            "kind": "azureOpenAI",
            "azureOpenAIParameters": azure_openai_parameters(
                openai,
                &openai.chat_deployment,
                &openai.chat_model,
            ),
        })
    } else {
        Value::Null
    };

    json!({
        "name": name,
        "kind": "azureBlob",
        "azureBlobParameters": {
            "connectionString": blob.search_connection_string,
            "containerName": blob.container_name,
            "embeddingModel": {
                "kind": "azureOpenAI",
                "vectorizerName": "blob-vectorizer",
                "azureOpenAIParameters": azure_openai_parameters(
                    openai,
                    &openai.embedding_deployment,
                    &openai.embedding_model,
                ),
            },
            "chatCompletionModel": chat_completion_model,
            "disableImageVerbalization": !openai.use_verbalization,
        },
    })
}

pub fn knowledge_base_payload(
    base_name: &str,
    source_name: &str,
    openai: &AzureOpenAiConfig,
) -> Value {
    json!({
        "name": base_name,
        "knowledgeSources": [{ "name": source_name }],
        "completionModel": {
            "kind": "azureOpenAI",
            "azureOpenAIParameters": azure_openai_parameters(
                openai,
                &openai.chat_deployment,
                &openai.chat_model,
            ),
        },
    })
}

pub fn retrieval_payload(question: &str) -> Value {
    json!({
        "messages": [
            {
                "role": "user",
                "content": [{ "type": "text", "text": question }],
            }
        ],
    })
}

fn azure_openai_parameters(openai: &AzureOpenAiConfig, deployment: &str, model: &str) -> Value {
    let mut params = json!({
        "resourceUri": openai.endpoint,
        "deploymentId": deployment,
        "modelName": model,
    });
    if let Some(key) = &openai.api_key {
        params["apiKey"] = json!(key);
    }
    params
}
