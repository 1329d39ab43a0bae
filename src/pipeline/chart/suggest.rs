use crate::llm::models::{GenerationConfig, GenerationRequest};
use crate::llm::LlmManager;
use crate::table::ResultTable;
use tracing::warn;

/// Rows of the result rendered into the selector prompt.
pub const SUGGESTION_PREVIEW_ROWS: usize = 25;

/// Asks the model for a chart recommendation over the result preview.
/// Returns the raw five-field suggestion block; `None` on model failure.
pub async fn suggest_chart(
    llm: &LlmManager,
    table: &ResultTable,
    question: &str,
    insight: &str,
) -> Option<String> {
    let prompt = build_prompt(
        &table.head_text(SUGGESTION_PREVIEW_ROWS),
        &table.kinds_text(),
        question,
        insight,
    );
    let request = GenerationRequest::new(prompt, GenerationConfig::deterministic(1000));

    match llm.generate(&request).await {
        Ok(text) => Some(text.trim().to_string()),
        Err(e) => {
            warn!("Chart suggestion failed: {}", e);
            None
        }
    }
}

fn build_prompt(preview: &str, column_kinds: &str, question: &str, insight: &str) -> String {
    format!(
        r#"You are a data visualization expert.

Your task is to recommend the most appropriate chart type for visualizing the given data extracted from a warehouse query.

Use the information below:

1. User Query:
{question}

2. Sample Rows (first few rows of the result):
{preview}

3. Column Types (data types for each column):
{column_kinds}

4. Insight derived from the data:
{insight}

---------------------
Instructions:
WHEN THE DATA CONTAINS ONLY ONE QUANTITY WHICH DOESNT NEED VISUALISATION DONT GIVE VISUALISATION JUST RETURN VISUALISATION NOT NEEDED

1. Understand the user's intent by analyzing the query.
2. Use the sample data and column types to determine which chart type best conveys the user's intent.
3. Only choose from the following chart types:
   - bar
   - line
   - scatter
   - pie
   - histogram
   - stacked_doughnut

4. Use these rules to guide chart type selection:
   - **Bar chart** → When comparing values across categories (e.g., compare totals for different neighborhoods, agencies, request types).
   - **Line chart** → When analyzing trends over time (e.g., months, days, timestamps).
   - **Scatter plot** → When showing the relationship or correlation between two numerical variables.
   - **Pie chart** → When showing proportions of a whole using categorical + numeric data (e.g., % share by category).
   - **Histogram** → When analyzing the distribution of a single numeric column (e.g., resolution times, counts).

5. Additional rule for comparisons:
   - If the user asks to **compare two or more values**, prefer a **bar chart** or **histogram**.
   - If the user asks to **show trends or progression over time**, use a **line chart**.

6. Column selection guidance:
   - For **bar, line, scatter**: select an X-axis (typically a category or time) and a Y-axis (numeric value).
   - For **pie and histogram**: specify the single column to be used as **Values**.

7. **Comparison-focused queries:**
- Comparing two request types (e.g., street cleaning vs pothole repair) → **Bar chart**
- Comparing counts across neighborhoods or agencies → **Bar chart**
- Comparing distributions or frequency of a numeric column → **Histogram**

8. **Trend-focused queries:**
Use a **line chart** when analyzing change over time:
- Monthly, daily, weekly changes
- Timestamp-based values
Examples:
- "How has the number of requests changed from Jan to March?" → **Line chart**
- "Show monthly graffiti complaints" → **Line chart**

9. **Correlation-focused queries:**
Use a **scatter plot** when showing relationships between two numeric variables:
- Resolution time vs request count
Examples:
- "Show relationship between number of requests and resolution time" → **Scatter plot**

10. **Proportion-focused queries:**
Use a **pie chart** when showing parts of a whole using categorical + numeric data:
- Share of requests by submission channel
Examples:
- "Show share of requests by source" → **Pie chart**

11. **Distribution of single numeric column:**
Use a **histogram** when analyzing how values are distributed:
- Resolution durations
- Counts
Examples:
- "Show distribution of resolution times" → **Histogram**

12. If the data has multiple columns representing different categories or time periods (e.g., 'avg_duration_may', 'avg_duration_jan'), and a single row:
   - Treat column names as categorical values on the X-axis.
   - Use their corresponding values as Y-axis values.
   - Use a **bar chart** to visualize them.
   - The X-axis should represent the column names (e.g., 'May', 'Jan'), not a literal 'month' column.
Example:
- If Chart type is bar → X-axis = ['May', 'Jan'], Y-axis = [296.53, 273.90], Values = N/A

13. **Stacked Doughnut (Sunburst Chart)**:
Use this when the data has **hierarchical categorical structure** — e.g., category → sub-category → sub-sub-category — and a corresponding numeric value.

Example:
- service_name → service_subtype → status → total_count

Use:
- Chart type: stacked_doughnut
- X-axis: N/A
- Y-axis: N/A
- Values: [total_count]
- Labels: [list of categorical columns in inner → outer order]
---------------------
Final Output Format (strictly follow this):

Chart type: [bar / line / scatter / pie / histogram / stacked_doughnut]
X-axis: [column_name or 'N/A']
Y-axis: [column_name or 'N/A']
Values: [column_name or 'N/A']
Labels: [column_name or 'N/A']

Rules:
- If Chart type is bar, line, or scatter → Values = 'N/A'
- If Chart type is pie:
   - Labels: [categorical_column]
   - Values: [numeric_column]
   - X-axis: N/A
   - Y-axis: N/A
- If Chart type is histogram → X-axis = N/A, Y-axis = N/A, Values = [column_name].
- If Chart type is stacked_doughnut:
  - Labels: [list of hierarchical categorical columns, e.g., ['service_name', 'service_subtype', 'status']]
  - Values: [numeric_column]
  - X-axis: N/A
  - Y-axis: N/A
Return only this structured answer. Do not explain or include any comments or justification."#,
        question = question,
        preview = preview,
        column_kinds = column_kinds,
        insight = insight,
    )
}
