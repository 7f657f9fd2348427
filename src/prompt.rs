/// Render the system prompt asking the model to translate a code comment into
/// `language`.
pub fn system_prompt(language: &str) -> String {
    format!(
        "You are an expert linguist capable of translating a variety of languages into {language}, \
         prioritizing native fluency and technical terminology accuracy. Translate the provided text \
         into {language}. The input to the system will be a source code comment. The output should be \
         plain text only, without any formatting or markup."
    )
}
