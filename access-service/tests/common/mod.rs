//! Test helpers for access-service integration tests.
//!
//! Wires every service against in-memory stores and delivery mocks so the
//! flows run without PostgreSQL, Redis, SMTP or Twilio.

#![allow(dead_code)]

use access_service::{
    build_router,
    config::{
        AccessConfig, DatabaseConfig, Environment, JwtConfig, OtpConfig, RedisConfig, SmtpConfig,
        TwilioConfig,
    },
    models::{NewUser, OtpChannel, OtpRecord, Service, User},
    services::{
        AuthService, Guardian, Identity, JwtService, MockCredentialStore, MockEmailService,
        MockKeyValueStore, MockPermissionStore, MockSmsService, OtpRepository, OtpService,
        SessionManager,
    },
    utils::{hash_password, Password},
    AppState,
};
use axum::Router;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;

pub const COUNTRY_CODE: &str = "62";
pub const SNAPSHOT_TTL_SECONDS: u64 = 300;

pub fn test_config(otp_enabled: bool) -> AccessConfig {
    AccessConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "access-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://localhost/access_test".to_string(),
            max_connections: 2,
            min_connections: 1,
        },
        redis: RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
        },
        jwt: JwtConfig {
            access_token_secret: SecretString::new("test-access-secret-0123456789abcdef".to_string()),
            refresh_token_secret: SecretString::new("test-refresh-secret-0123456789abcdef".to_string()),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        otp: OtpConfig {
            enabled: otp_enabled,
            sender_name: "ACCESS".to_string(),
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            sender: "no-reply@localhost".to_string(),
            password: SecretString::new(String::new()),
        },
        twilio: TwilioConfig {
            account_sid: String::new(),
            auth_token: SecretString::new(String::new()),
            phone_number: String::new(),
        },
        phone_default_country_code: COUNTRY_CODE.to_string(),
        guardian_snapshot_ttl_seconds: SNAPSHOT_TTL_SECONDS,
        allowed_origins: vec!["http://localhost:3000".to_string()],
    }
}

/// Every collaborator of [`AppState`], with handles on the mocks.
pub struct TestApp {
    pub state: AppState,
    pub kv: Arc<MockKeyValueStore>,
    pub users: Arc<MockCredentialStore>,
    pub permissions: Arc<MockPermissionStore>,
    pub email: Arc<MockEmailService>,
    pub sms: Arc<MockSmsService>,
    pub otp_repo: OtpRepository,
    pub sessions: SessionManager,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(true, MockEmailService::new(), MockSmsService::new())
    }

    pub fn without_otp_gate() -> Self {
        Self::build(false, MockEmailService::new(), MockSmsService::new())
    }

    pub fn with_failing_delivery() -> Self {
        Self::build(true, MockEmailService::failing(), MockSmsService::failing())
    }

    fn build(otp_enabled: bool, email: MockEmailService, sms: MockSmsService) -> Self {
        let config = test_config(otp_enabled);

        let kv = Arc::new(MockKeyValueStore::new());
        let users = Arc::new(MockCredentialStore::new());
        let permissions = Arc::new(MockPermissionStore::new());
        let email = Arc::new(email);
        let sms = Arc::new(sms);

        let jwt = JwtService::new(&config.jwt);
        let otp_repo = OtpRepository::new(kv.clone());
        let otp = OtpService::new(
            otp_repo.clone(),
            email.clone(),
            sms.clone(),
            config.otp.sender_name.clone(),
            COUNTRY_CODE,
        );
        let sessions = SessionManager::new(users.clone(), jwt.clone());
        let auth = AuthService::new(
            users.clone(),
            permissions.clone(),
            otp.clone(),
            sessions.clone(),
            jwt.clone(),
            otp_enabled,
            COUNTRY_CODE,
        );
        let guardian = Guardian::new(users.clone(), permissions.clone())
            .with_snapshot_cache(kv.clone(), SNAPSHOT_TTL_SECONDS);

        let state = AppState {
            config: Arc::new(config),
            db: None,
            kv: kv.clone(),
            jwt,
            auth,
            otp,
            guardian,
        };

        Self {
            state,
            kv,
            users,
            permissions,
            email,
            sms,
            otp_repo,
            sessions,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Seed an account with a known password. Returns the stored user.
    pub fn seed_user(&self, id: i64, email: &str, phone: &str, username: &str, password: &str) -> User {
        let hash = hash_password(&Password::new(password.to_string())).expect("hash password");
        let user = NewUser::new(
            email.to_string(),
            phone.to_string(),
            username.to_string(),
            hash.as_str().to_string(),
        )
        .into_user(id);
        self.users.insert(user.clone(), hash.as_str()).expect("seed user");
        user
    }

    pub fn access_token_for(&self, user: &User) -> String {
        self.state
            .jwt
            .generate_access_token(&Identity::from(user))
            .expect("generate access token")
    }

    /// Current OTP record for a value, read straight from the store.
    pub async fn otp_record(&self, channel: OtpChannel, value: &str) -> Option<OtpRecord> {
        let id = self.state.otp.normalize(channel, value).expect("normalize");
        self.otp_repo.get(channel, &id).await.expect("read otp record")
    }

    pub async fn otp_code(&self, channel: OtpChannel, value: &str) -> String {
        self.otp_record(channel, value)
            .await
            .expect("otp record exists")
            .code
    }

    /// Move a record's expiry into the past without touching its store TTL.
    pub async fn expire_otp(&self, channel: OtpChannel, value: &str) {
        let mut record = self.otp_record(channel, value).await.expect("otp record exists");
        record.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        self.otp_repo.put(channel, &record).await.expect("rewrite otp record");
    }

    /// Create and verify an OTP for a value.
    pub async fn verify_channel(&self, channel: OtpChannel, value: &str) {
        self.state.otp.create(channel, value).await.expect("create otp");
        let code = self.otp_code(channel, value).await;
        self.state
            .otp
            .verify(channel, value, &code)
            .await
            .expect("verify otp");
    }

    /// Application `billing` (id 7) with an `invoices` service (id 70).
    pub fn seed_billing(&self, app_active: bool, service_active: bool) {
        self.permissions
            .add_application(7, "billing", app_active)
            .expect("add application");
        self.permissions
            .add_service(Service {
                id: 70,
                application_id: 7,
                slug: "invoices".to_string(),
                name: "Invoices".to_string(),
                scope: "internal".to_string(),
                is_active: service_active,
            })
            .expect("add service");
    }
}

/// Let spawned delivery tasks run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
