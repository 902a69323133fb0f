/// Creates a single [`Turn`](crate::Turn) from a role shorthand.
///
/// ```rust
/// use fconverse::{Turn, fc_turn};
///
/// let turn = fc_turn!(assistant => "Done.");
/// assert_eq!(turn, Turn::assistant("Done."));
/// ```
#[macro_export]
macro_rules! fc_turn {
    (system => $content:expr $(,)?) => {
        $crate::Turn::system($content)
    };
    (user => $content:expr $(,)?) => {
        $crate::Turn::user($content)
    };
    (assistant => $content:expr $(,)?) => {
        $crate::Turn::assistant($content)
    };
    ($role:ident => $content:expr $(,)?) => {
        compile_error!("unsupported role: use system, user, or assistant");
    };
}

/// Builds a [`Transcript`](crate::Transcript) from role/content pairs.
/// Evaluates to `Result<Transcript, ChatError>`.
///
/// ```rust
/// use fconverse::fc_transcript;
///
/// let transcript = fc_transcript![
///     system => "You are concise.",
///     user => "Summarize this repository.",
/// ]
/// .expect("text turns always pair");
///
/// assert_eq!(transcript.len(), 2);
/// ```
#[macro_export]
macro_rules! fc_transcript {
    () => {
        ::std::result::Result::<$crate::Transcript, $crate::ChatError>::Ok(
            $crate::Transcript::new(),
        )
    };
    ($($role:ident => $content:expr),+ $(,)?) => {
        $crate::Transcript::from_turns(vec![$($crate::fc_turn!($role => $content)),+])
    };
}
