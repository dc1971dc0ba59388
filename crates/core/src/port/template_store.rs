// Template Store Port (§3)

use crate::domain::Template;
use crate::error::Result;
use async_trait::async_trait;

/// Read-only access to immutable (template_id, version) template definitions (I6).
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get(&self, template_id: &str, version: i64) -> Result<Option<Template>>;
}

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub struct InMemoryTemplateStore {
        templates: Mutex<HashMap<(String, i64), Template>>,
    }

    impl InMemoryTemplateStore {
        pub fn new(template: Template) -> Self {
            let mut map = HashMap::new();
            map.insert((template.template_id.clone(), template.version), template);
            Self { templates: Mutex::new(map) }
        }
    }

    #[async_trait]
    impl TemplateStore for InMemoryTemplateStore {
        async fn get(&self, template_id: &str, version: i64) -> Result<Option<Template>> {
            Ok(self
                .templates
                .lock()
                .unwrap()
                .get(&(template_id.to_string(), version))
                .cloned())
        }
    }
}
