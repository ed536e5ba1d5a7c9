use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::application::reporting::{DevelopmentErrorBody, RestrictedErrorBody};
use crate::presentation::http::handlers::demo::{
    AcceptedDto, ItemDto, SessionDto, SignupDto, SignupResponseDto,
};
use crate::presentation::http::handlers::system::{HealthzDto, IndexDto};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::presentation::http::handlers::system::index,
        crate::presentation::http::handlers::system::healthz,
        crate::presentation::http::handlers::demo::get_item,
        crate::presentation::http::handlers::demo::signup,
        crate::presentation::http::handlers::demo::session,
        crate::presentation::http::handlers::demo::raise
    ),
    components(
        schemas(
            IndexDto,
            HealthzDto,
            ItemDto,
            SignupDto,
            SignupResponseDto,
            SessionDto,
            AcceptedDto,
            RestrictedErrorBody,
            DevelopmentErrorBody
        )
    ),
    tags(
        (name = "system", description = "Service endpoints"),
        (name = "demo", description = "Endpoints raising each failure kind")
    ),
    modifiers(&SecurityAddon)
)]
pub(crate) struct ApiDoc;

pub(crate) struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.take().unwrap_or_default();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        openapi.components = Some(components);
    }
}
