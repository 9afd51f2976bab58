use super::authorizer::AuthorizationDecision;

/// Union-of-permissions merge of per-role decisions.
///
/// The first allowing decision in iteration order is returned unchanged, so
/// its role and constraint are the ones enforced. The input is consumed lazily
/// and nothing after the first allow is evaluated. No allow means deny.
pub fn aggregate_decisions<I>(decisions: I) -> AuthorizationDecision
where
    I: IntoIterator<Item = AuthorizationDecision>,
{
    decisions
        .into_iter()
        .find(|decision| decision.allowed)
        .unwrap_or_else(AuthorizationDecision::deny)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::principal::Role;

    #[test]
    fn test_empty_input_denies() {
        assert_eq!(aggregate_decisions(Vec::new()), AuthorizationDecision::deny());
    }

    #[test]
    fn test_any_allow_wins_over_denies() {
        let decision = aggregate_decisions(vec![
            AuthorizationDecision::deny(),
            AuthorizationDecision::allow(Role::from("b"), "job=\"b\"".into()),
            AuthorizationDecision::deny(),
        ]);
        assert!(decision.allowed);
        assert_eq!(decision.role, Some(Role::from("b")));
    }

    #[test]
    fn test_first_allow_is_kept() {
        let decision = aggregate_decisions(vec![
            AuthorizationDecision::allow(Role::from("a"), "first".into()),
            AuthorizationDecision::allow(Role::from("b"), "second".into()),
        ]);
        assert_eq!(decision.constraint.unwrap().as_str(), "first");
    }

    #[test]
    fn test_stops_after_first_allow() {
        let mut evaluated = 0;
        let decisions = ["a", "b", "c"].into_iter().map(|name| {
            evaluated += 1;
            AuthorizationDecision::allow(Role::from(name), "".into())
        });
        let decision = aggregate_decisions(decisions);
        assert_eq!(decision.role, Some(Role::from("a")));
        assert_eq!(evaluated, 1);
    }
}
