use crate::error::AiError;
use crate::nebline::config::{ClientSettings, ProviderCredentials};
use crate::nebline::registry;
use crate::nebline::types::{ChatRequest, GenerateRequest, GenerateResponse};
use crate::providers::{HttpProviderFactory, ProviderFactory};

/// Resolves a logical model and dispatches to a freshly built provider.
///
/// Holds no credentials and no provider instances; every call gets its keys
/// explicitly and builds its own provider.
pub struct Router<F = HttpProviderFactory> {
    factory: F,
}

impl Router<HttpProviderFactory> {
    pub fn http(settings: ClientSettings) -> Self {
        Self::new(HttpProviderFactory::new(settings))
    }
}

impl<F: ProviderFactory> Router<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    pub fn generate(
        &self,
        request: GenerateRequest,
        credentials: &ProviderCredentials,
    ) -> Result<GenerateResponse, AiError> {
        if request.model.trim().is_empty() {
            return Err(AiError::NoModelConfigured);
        }
        let mapping = registry::lookup(&request.model)?;

        let messages: Vec<_> = request.messages.into_iter().flatten().collect();
        if messages.is_empty() {
            return Err(AiError::EmptyConversation);
        }

        let api_key = credentials
            .for_vendor(mapping.vendor)
            .ok_or(AiError::MissingCredential(mapping.vendor))?;

        tracing::debug!(
            model = mapping.id,
            vendor = mapping.vendor.label(),
            vendor_model = mapping.model_name,
            messages = messages.len(),
            "dispatching generation request"
        );

        let chat = ChatRequest {
            messages,
            max_tokens: request.max_tokens,
            response_format: request.response_format,
        };
        let provider = self.factory.build(mapping.vendor, api_key);
        provider.generate(mapping.model_name, &chat)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use crate::error::AiError;
    use crate::nebline::registry::Vendor;
    use crate::nebline::types::{ChatRequest, GenerateResponse};
    use crate::providers::{Provider, ProviderFactory};

    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub vendor: Vendor,
        pub api_key: String,
        pub model_name: String,
        pub request: ChatRequest,
    }

    /// Factory whose providers record each call and replay queued replies.
    #[derive(Default, Clone)]
    pub struct RecordingFactory {
        pub calls: Rc<RefCell<Vec<RecordedCall>>>,
        pub builds: Rc<RefCell<usize>>,
        pub replies: Rc<RefCell<VecDeque<Result<GenerateResponse, AiError>>>>,
    }

    impl RecordingFactory {
        pub fn replying(text: &str) -> Self {
            let factory = Self::default();
            factory.push_reply(Ok(GenerateResponse::new(text)));
            factory
        }

        pub fn push_reply(&self, reply: Result<GenerateResponse, AiError>) {
            self.replies.borrow_mut().push_back(reply);
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.borrow().clone()
        }
    }

    struct RecordingProvider {
        vendor: Vendor,
        api_key: String,
        factory: RecordingFactory,
    }

    impl Provider for RecordingProvider {
        fn generate(
            &self,
            model_name: &str,
            request: &ChatRequest,
        ) -> Result<GenerateResponse, AiError> {
            self.factory.calls.borrow_mut().push(RecordedCall {
                vendor: self.vendor,
                api_key: self.api_key.clone(),
                model_name: model_name.to_string(),
                request: request.clone(),
            });
            self.factory
                .replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(GenerateResponse::new("ok")))
        }
    }

    impl ProviderFactory for RecordingFactory {
        fn build(&self, vendor: Vendor, api_key: &str) -> Box<dyn Provider> {
            *self.builds.borrow_mut() += 1;
            Box::new(RecordingProvider {
                vendor,
                api_key: api_key.to_string(),
                factory: self.clone(),
            })
        }
    }
}
