/// Document and font loading state, read between stability checks. Network
/// activity comes from protocol events instead.
pub const LOAD_STATE: &str = r#"
() => ({
    readyState: document.readyState,
    fontsLoading: !!document.fonts && document.fonts.status === 'loading'
})
"#;
