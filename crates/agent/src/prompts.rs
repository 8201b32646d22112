//! Fixed Urdu prompt and message text.

/// Persona for chat replies.
pub const SYSTEM_PROMPT: &str = "آپ رہنما ہیں، ایک مددگار اور شائستہ اردو اسسٹنٹ۔ \
صرف اردو میں مختصر، واضح اور درست جواب دیں۔ \
آپ عام گفتگو، متن کی بہتری اور خلاصہ نویسی میں مدد کرتے ہیں۔ \
مذہبی فتوے، طبی، قانونی یا تکنیکی مشورے نہ دیں۔";

/// Default persona for the raw `/generate` surface.
pub const DEFAULT_GENERATE_SYSTEM_PROMPT: &str =
    "آپ ایک مددگار اور بے ضرر مصنوعی ذہانت کے اسسٹنٹ ہیں۔";

pub const CLASSIFIER_SYSTEM_PROMPT: &str = "آپ ایک معاون کلاسیفائر ہیں۔";

const INTENT_CLASSIFICATION_TEMPLATE: &str = "نیچے دیے گئے صارف کے پیغام کی نیت کی درجہ بندی کریں۔\n\
صرف ایک لفظ میں جواب دیں: rewrite, summarize, chat, یا blocked۔\n\
- rewrite: اگر صارف کسی متن کو بہتر یا دوبارہ لکھوانا چاہتا ہے\n\
- summarize: اگر صارف کسی متن کا خلاصہ چاہتا ہے\n\
- blocked: اگر پیغام مذہبی فتوے، طبی، قانونی یا تکنیکی مدد سے متعلق ہے\n\
- chat: باقی تمام صورتوں میں\n\n\
صارف کا پیغام: {user_input}\n\
نیت:";

pub const SAFETY_REFUSAL: &str = "معذرت، میں اس موضوع پر مدد نہیں کر سکتا۔ \
مذہبی، طبی، قانونی یا تکنیکی معاملات کے لیے کسی مستند ماہر سے رجوع کریں۔";

pub const HISTORY_LABEL: &str = "پچھلی گفتگو:";
pub const NEW_QUESTION_LABEL: &str = "صارف کا نیا سوال:";

pub fn classification_prompt(user_input: &str) -> String {
    INTENT_CLASSIFICATION_TEMPLATE.replace("{user_input}", user_input)
}
