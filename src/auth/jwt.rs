use chrono::Duration;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SESSION_LIFETIME_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: i64,
}

impl SessionClaims {
    pub fn for_user(user_id: Uuid) -> Self {
        let exp = (chrono::Utc::now() + Duration::hours(SESSION_LIFETIME_HOURS)).timestamp();
        Self {
            sub: user_id.to_string(),
            exp,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.sub.parse().ok()
    }
}

pub fn generate_token<K: AsRef<[u8]>>(
    claims: SessionClaims,
    key: K,
) -> jsonwebtoken::errors::Result<String> {
    let header = Header::default();
    let key = EncodingKey::from_secret(key.as_ref());

    let token = jsonwebtoken::encode(&header, &claims, &key)?;
    Ok(token)
}

pub fn issue_session_token<K: AsRef<[u8]>>(
    user_id: Uuid,
    key: K,
) -> jsonwebtoken::errors::Result<String> {
    generate_token(SessionClaims::for_user(user_id), key)
}

pub fn process_token<K: AsRef<[u8]>>(
    token: &str,
    key: K,
) -> jsonwebtoken::errors::Result<TokenData<SessionClaims>> {
    let validation = Validation::default();
    let key = DecodingKey::from_secret(key.as_ref());

    let claims = jsonwebtoken::decode::<SessionClaims>(token, &key, &validation)?;
    Ok(claims)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn issued_token_round_trips_user_id() {
        let id = Uuid::new_v4();
        let token = issue_session_token(id, "secret").unwrap();
        let data = process_token(&token, "secret").unwrap();
        assert_eq!(data.claims.user_id(), Some(id));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = issue_session_token(Uuid::new_v4(), "secret").unwrap();
        assert!(process_token(&token, "other").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = SessionClaims {
            sub: Uuid::new_v4().to_string(),
            exp: (chrono::Utc::now() - Duration::hours(2)).timestamp(),
        };
        let token = generate_token(claims, "secret").unwrap();
        assert!(process_token(&token, "secret").is_err());
    }
}
