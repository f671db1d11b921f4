//! Edge case tests for the authentication flows
//!
//! Exercises the orchestrator end to end over the in-memory store and user
//! repository:
//! - Login abuse controls (rate limit, lockout, unknown and inactive users)
//! - Token lifecycle (refresh rotation, logout, log out everywhere)
//! - Password reset and change
//! - Behavior with the auxiliary store down

#[cfg(test)]
mod login_tests {
    use super::super::error::AuthError;
    use super::super::testutil::*;
    use super::super::users::UserId;

    #[tokio::test]
    async fn test_login_returns_pair_and_summary() {
        let h = harness().await;
        let response = h
            .service
            .login("alice@example.com", TEST_PASSWORD, &client("10.0.0.1"))
            .await
            .unwrap();

        assert_eq!(response.token_type, "bearer");
        assert_eq!(response.expires_in, ACCESS_TTL.as_secs());
        assert_eq!(response.user.id, UserId(1));
        assert_eq!(response.user.email, "alice@example.com");
        assert_ne!(response.access_token, response.refresh_token);

        let sessions = h.service.list_sessions(UserId(1)).await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_email_lookup_ignores_case() {
        let h = harness().await;
        assert!(h
            .service
            .login("Alice@Example.COM", TEST_PASSWORD, &client("10.0.0.1"))
            .await
            .is_ok());
    }

    // =========================================================================
    // Sixth attempt from one address inside the window is rate limited
    // =========================================================================
    #[tokio::test]
    async fn test_sixth_attempt_from_same_ip_is_rate_limited() {
        let h = harness().await;
        let ip = client("203.0.113.9");

        // Spread over different accounts so lockout stays out of the way
        for i in 0..5 {
            let result = h
                .service
                .login(&format!("nobody{i}@example.com"), "wrong", &ip)
                .await;
            assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        }

        let result = h.service.login("alice@example.com", TEST_PASSWORD, &ip).await;
        match result {
            Err(AuthError::RateLimited { retry_after_secs }) => {
                assert!(retry_after_secs >= 1 && retry_after_secs <= 60);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }

        // Another source is unaffected
        assert!(h
            .service
            .login("alice@example.com", TEST_PASSWORD, &client("203.0.113.10"))
            .await
            .is_ok());
    }

    // =========================================================================
    // Fifth failure locks the account; the right password no longer helps
    // =========================================================================
    #[tokio::test]
    async fn test_fifth_failure_locks_account() {
        let h = harness().await;

        for attempt in 1..=4 {
            let result = h
                .service
                .login("bob@example.com", "wrong", &client(&format!("10.1.0.{attempt}")))
                .await;
            assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        }

        let fifth = h
            .service
            .login("bob@example.com", "wrong", &client("10.1.0.5"))
            .await;
        match fifth {
            Err(AuthError::AccountLocked { remaining_seconds }) => {
                assert!(remaining_seconds > 0 && remaining_seconds <= 900);
            }
            other => panic!("expected lockout, got {other:?}"),
        }

        let correct = h
            .service
            .login("bob@example.com", TEST_PASSWORD, &client("10.1.0.6"))
            .await;
        assert!(matches!(correct, Err(AuthError::AccountLocked { .. })));
    }

    #[tokio::test]
    async fn test_success_clears_failure_counter() {
        let h = harness().await;
        for attempt in 1..=3 {
            let _ = h
                .service
                .login("bob@example.com", "wrong", &client(&format!("10.2.0.{attempt}")))
                .await;
        }
        assert_eq!(
            h.store.get_counter("failed_login:bob@example.com").await.unwrap(),
            3
        );

        h.service
            .login("bob@example.com", TEST_PASSWORD, &client("10.2.0.9"))
            .await
            .unwrap();
        assert_eq!(
            h.store.get("failed_login:bob@example.com").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_unknown_user_is_indistinguishable_and_counted() {
        let h = harness().await;
        let result = h
            .service
            .login("ghost@example.com", TEST_PASSWORD, &client("10.3.0.1"))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        assert_eq!(
            h.store.get_counter("failed_login:ghost@example.com").await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_inactive_user_refused_after_password_check() {
        let h = harness().await;
        h.users.set_active(UserId(2), false).await;

        let wrong = h
            .service
            .login("bob@example.com", "wrong", &client("10.4.0.1"))
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        let right = h
            .service
            .login("bob@example.com", TEST_PASSWORD, &client("10.4.0.2"))
            .await;
        assert!(matches!(right, Err(AuthError::InactiveUser)));
        assert!(h.service.list_sessions(UserId(2)).await.is_empty());
    }
}

#[cfg(test)]
mod token_lifecycle_tests {
    use std::time::Duration;

    use time::OffsetDateTime;

    use super::super::error::AuthError;
    use super::super::jwt::TokenType;
    use super::super::roles::Role;
    use super::super::testutil::*;
    use super::super::users::UserId;

    #[tokio::test]
    async fn test_authenticate_accepts_access_tokens_only() {
        let h = harness().await;
        let login = h
            .service
            .login("alice@example.com", TEST_PASSWORD, &client("10.5.0.1"))
            .await
            .unwrap();

        let user = h.service.authenticate(&login.access_token).await.unwrap();
        assert_eq!(user.id, UserId(1));
        assert_eq!(user.role, Role::Hr);

        assert!(matches!(
            h.service.authenticate(&login.refresh_token).await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            h.service.authenticate("garbage").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_deactivated_user() {
        let h = harness().await;
        let login = h
            .service
            .login("bob@example.com", TEST_PASSWORD, &client("10.5.0.2"))
            .await
            .unwrap();
        h.users.set_active(UserId(2), false).await;

        assert!(matches!(
            h.service.authenticate(&login.access_token).await,
            Err(AuthError::InactiveUser)
        ));
    }

    // =========================================================================
    // Refresh rotates: the presented refresh token cannot be used twice
    // =========================================================================
    #[tokio::test]
    async fn test_refresh_rotates_tokens() {
        let h = harness().await;
        let ip = client("10.6.0.1");
        let login = h
            .service
            .login("alice@example.com", TEST_PASSWORD, &ip)
            .await
            .unwrap();

        let refreshed = h.service.refresh(&login.refresh_token, &ip).await.unwrap();
        assert_ne!(refreshed.access_token, login.access_token);
        assert!(h.service.authenticate(&refreshed.access_token).await.is_ok());

        assert!(matches!(
            h.service.refresh(&login.refresh_token, &ip).await,
            Err(AuthError::InvalidToken)
        ));
        assert!(h
            .service
            .refresh(&refreshed.refresh_token, &ip)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_access_token_cannot_refresh() {
        let h = harness().await;
        let ip = client("10.6.0.2");
        let login = h
            .service
            .login("alice@example.com", TEST_PASSWORD, &ip)
            .await
            .unwrap();

        assert!(matches!(
            h.service.refresh(&login.access_token, &ip).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_access_and_refresh() {
        let h = harness().await;
        let ip = client("10.7.0.1");
        let login = h
            .service
            .login("alice@example.com", TEST_PASSWORD, &ip)
            .await
            .unwrap();

        h.service
            .logout(UserId(1), &login.access_token, Some(&login.refresh_token))
            .await;

        assert!(matches!(
            h.service.authenticate(&login.access_token).await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            h.service.refresh(&login.refresh_token, &ip).await,
            Err(AuthError::InvalidToken)
        ));
        assert!(h.service.list_sessions(UserId(1)).await.is_empty());
    }

    #[tokio::test]
    async fn test_logout_ignores_someone_elses_refresh_token() {
        let h = harness().await;
        let alice = h
            .service
            .login("alice@example.com", TEST_PASSWORD, &client("10.7.0.2"))
            .await
            .unwrap();
        let bob = h
            .service
            .login("bob@example.com", TEST_PASSWORD, &client("10.7.0.3"))
            .await
            .unwrap();

        h.service
            .logout(UserId(1), &alice.access_token, Some(&bob.refresh_token))
            .await;

        assert!(h
            .service
            .refresh(&bob.refresh_token, &client("10.7.0.3"))
            .await
            .is_ok());
    }

    // =========================================================================
    // Log out everywhere: every recorded access token stops working
    // =========================================================================
    #[tokio::test]
    async fn test_revoke_all_sessions() {
        let h = harness().await;
        let laptop = h
            .service
            .login("alice@example.com", TEST_PASSWORD, &client("10.8.0.1"))
            .await
            .unwrap();
        let phone = h
            .service
            .login("alice@example.com", TEST_PASSWORD, &client("10.8.0.2"))
            .await
            .unwrap();
        let bob = h
            .service
            .login("bob@example.com", TEST_PASSWORD, &client("10.8.0.3"))
            .await
            .unwrap();

        assert_eq!(h.service.revoke_all_sessions(UserId(1)).await, 2);

        for token in [&laptop.access_token, &phone.access_token] {
            assert!(matches!(
                h.service.authenticate(token).await,
                Err(AuthError::InvalidToken)
            ));
        }
        assert!(h.service.authenticate(&bob.access_token).await.is_ok());

        // Refresh tokens issued before the cutoff are dead too
        let earlier = OffsetDateTime::now_utc() - time::Duration::minutes(5);
        let stale = h
            .service
            .jwt()
            .issue_at(UserId(1), TokenType::Refresh, REFRESH_TTL, earlier)
            .unwrap();
        assert!(matches!(
            h.service.refresh(&stale, &client("10.8.0.1")).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_revocation_entries_expire_with_token() {
        tokio::time::pause();
        let h = harness().await;
        let login = h
            .service
            .login("alice@example.com", TEST_PASSWORD, &client("10.9.0.1"))
            .await
            .unwrap();
        h.service.logout(UserId(1), &login.access_token, None).await;

        let keys = h.store.scan_prefix("blacklist:").await.unwrap();
        assert_eq!(keys.len(), 1);
        let ttl = h.store.ttl(&keys[0]).await.unwrap().unwrap();
        assert!(ttl <= ACCESS_TTL && ttl > ACCESS_TTL - Duration::from_secs(5));

        tokio::time::advance(ACCESS_TTL).await;
        assert!(h.store.scan_prefix("blacklist:").await.unwrap().is_empty());
    }
}

#[cfg(test)]
mod password_reset_tests {
    use super::super::error::AuthError;
    use super::super::password::verify_password;
    use super::super::testutil::*;
    use super::super::users::UserId;

    const NEW_PASSWORD: &str = "N3w!Password";

    #[tokio::test]
    async fn test_forgot_password_only_delivers_to_known_active_users() {
        let h = harness().await;
        let ip = client("10.10.0.1");

        h.service.forgot_password("ghost@example.com", &ip).await.unwrap();
        assert!(h.delivery.sent().await.is_empty());

        h.users.set_active(UserId(2), false).await;
        h.service.forgot_password("bob@example.com", &ip).await.unwrap();
        assert!(h.delivery.sent().await.is_empty());

        h.service.forgot_password("alice@example.com", &ip).await.unwrap();
        let sent = h.delivery.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, UserId(1));
    }

    #[tokio::test]
    async fn test_reset_sets_password_and_revokes_sessions() {
        let h = harness().await;
        let before = h
            .service
            .login("alice@example.com", TEST_PASSWORD, &client("10.11.0.1"))
            .await
            .unwrap();

        h.service
            .forgot_password("alice@example.com", &client("10.11.0.1"))
            .await
            .unwrap();
        let ticket = h.delivery.last_ticket().await.unwrap();

        h.service.reset_password(&ticket, NEW_PASSWORD).await.unwrap();

        let hash = h.users.password_hash(UserId(1)).await.unwrap();
        assert!(verify_password(NEW_PASSWORD, &hash));
        assert!(matches!(
            h.service.authenticate(&before.access_token).await,
            Err(AuthError::InvalidToken)
        ));

        assert!(matches!(
            h.service.reset_password(&ticket, NEW_PASSWORD).await,
            Err(AuthError::InvalidTicket)
        ));
        assert!(h
            .service
            .login("alice@example.com", NEW_PASSWORD, &client("10.11.0.2"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_weak_password_does_not_spend_ticket() {
        let h = harness().await;
        h.service
            .forgot_password("alice@example.com", &client("10.12.0.1"))
            .await
            .unwrap();
        let ticket = h.delivery.last_ticket().await.unwrap();

        assert!(matches!(
            h.service.reset_password(&ticket, "weak").await,
            Err(AuthError::WeakPassword(_))
        ));
        assert!(h.service.reset_password(&ticket, NEW_PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_ticket_is_rejected() {
        let h = harness().await;
        assert!(matches!(
            h.service.reset_password("forged", NEW_PASSWORD).await,
            Err(AuthError::InvalidTicket)
        ));
    }

    #[tokio::test]
    async fn test_forgot_password_is_rate_limited_per_source() {
        let h = harness().await;
        let ip = client("10.13.0.1");
        for _ in 0..5 {
            h.service.forgot_password("alice@example.com", &ip).await.unwrap();
        }
        assert!(matches!(
            h.service.forgot_password("alice@example.com", &ip).await,
            Err(AuthError::RateLimited { .. })
        ));
        assert_eq!(h.delivery.sent().await.len(), 5);
    }

    #[tokio::test]
    async fn test_change_password_requires_current() {
        let h = harness().await;

        assert!(matches!(
            h.service
                .change_password(UserId(2), "not-it", NEW_PASSWORD)
                .await,
            Err(AuthError::IncorrectPassword)
        ));
        assert!(matches!(
            h.service
                .change_password(UserId(2), TEST_PASSWORD, "short")
                .await,
            Err(AuthError::WeakPassword(_))
        ));

        h.service
            .change_password(UserId(2), TEST_PASSWORD, NEW_PASSWORD)
            .await
            .unwrap();
        let hash = h.users.password_hash(UserId(2)).await.unwrap();
        assert!(verify_password(NEW_PASSWORD, &hash));
    }

    #[tokio::test]
    async fn test_change_password_guessing_locks_account() {
        let h = harness().await;

        for _ in 0..4 {
            assert!(matches!(
                h.service
                    .change_password(UserId(2), "guess", NEW_PASSWORD)
                    .await,
                Err(AuthError::IncorrectPassword)
            ));
        }
        assert!(matches!(
            h.service
                .change_password(UserId(2), "guess", NEW_PASSWORD)
                .await,
            Err(AuthError::AccountLocked { .. })
        ));

        // Locked now, even with the right password, on both paths
        assert!(matches!(
            h.service
                .change_password(UserId(2), TEST_PASSWORD, NEW_PASSWORD)
                .await,
            Err(AuthError::AccountLocked { remaining_seconds }) if remaining_seconds > 0
        ));
        assert!(matches!(
            h.service
                .login("bob@example.com", TEST_PASSWORD, &client("10.14.0.1"))
                .await,
            Err(AuthError::AccountLocked { .. })
        ));
        let hash = h.users.password_hash(UserId(2)).await.unwrap();
        assert!(verify_password(TEST_PASSWORD, &hash));
    }
}

#[cfg(test)]
mod store_outage_tests {
    use super::super::error::AuthError;
    use super::super::testutil::*;
    use super::super::users::UserId;

    // =========================================================================
    // With the store gone login and authentication keep working while the
    // store-backed protections switch off
    // =========================================================================
    #[tokio::test]
    async fn test_login_survives_store_outage() {
        let h = harness().await;
        h.backend.set_available(false);

        let login = h
            .service
            .login("alice@example.com", TEST_PASSWORD, &client("10.20.0.1"))
            .await
            .unwrap();
        assert!(h.service.authenticate(&login.access_token).await.is_ok());
        assert!(h.service.list_sessions(UserId(1)).await.is_empty());
    }

    #[tokio::test]
    async fn test_abuse_controls_fail_open() {
        let h = harness().await;
        h.backend.set_available(false);
        let ip = client("10.20.0.2");

        // Neither the rate limit nor the lockout can engage
        for _ in 0..10 {
            assert!(matches!(
                h.service.login("bob@example.com", "wrong", &ip).await,
                Err(AuthError::InvalidCredentials)
            ));
        }
        assert!(h
            .service
            .login("bob@example.com", TEST_PASSWORD, &ip)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_existing_lock_not_enforced_during_outage() {
        let h = harness().await;
        for attempt in 1..=5 {
            let _ = h
                .service
                .login("bob@example.com", "wrong", &client(&format!("10.21.0.{attempt}")))
                .await;
        }
        assert!(matches!(
            h.service
                .login("bob@example.com", TEST_PASSWORD, &client("10.21.0.6"))
                .await,
            Err(AuthError::AccountLocked { .. })
        ));

        h.backend.set_available(false);
        assert!(h
            .service
            .login("bob@example.com", TEST_PASSWORD, &client("10.21.0.7"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_revoked_token_readmitted_during_outage() {
        let h = harness().await;
        let login = h
            .service
            .login("alice@example.com", TEST_PASSWORD, &client("10.22.0.1"))
            .await
            .unwrap();
        h.service.logout(UserId(1), &login.access_token, None).await;
        assert!(h.service.authenticate(&login.access_token).await.is_err());

        h.backend.set_available(false);
        assert!(h.service.authenticate(&login.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_succeeds_without_store() {
        let h = harness().await;
        let login = h
            .service
            .login("alice@example.com", TEST_PASSWORD, &client("10.23.0.1"))
            .await
            .unwrap();

        h.backend.set_available(false);
        h.service
            .logout(UserId(1), &login.access_token, Some(&login.refresh_token))
            .await;
    }

    #[tokio::test]
    async fn test_password_reset_fails_closed() {
        let h = harness().await;
        h.service
            .forgot_password("alice@example.com", &client("10.24.0.1"))
            .await
            .unwrap();
        let ticket = h.delivery.last_ticket().await.unwrap();

        h.backend.set_available(false);

        // Same generic answer, nothing delivered
        h.service
            .forgot_password("alice@example.com", &client("10.24.0.1"))
            .await
            .unwrap();
        assert_eq!(h.delivery.sent().await.len(), 1);

        assert!(matches!(
            h.service.reset_password(&ticket, "N3w!Password").await,
            Err(AuthError::InvalidTicket)
        ));
    }
}
