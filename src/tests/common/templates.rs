//! Organization query templates used as seed data in tests

pub const REACTION_TEMPLATE: &str = r#"{% if params.settings %}SET mapred.job.name=generate_reaction_{{ params.experiment_id }};
SET mapred.job.queue.name=bis;
SET hive.exec.dynamic.partition.mode=nonstrict;
USE {{ params.ghp_hive_dbname }};
CREATE TABLE IF NOT EXISTS {{ params.reaction_table }} (
session_id STRING,
easy_id STRING,
pattern_id STRING,
reaction_type STRING,
reaction_count INT
)
PARTITIONED BY (
experiment_id INT,
period_end TIMESTAMP
)
ROW FORMAT DELIMITED
FIELDS TERMINATED BY ''
STORED AS RCFILE
;
{% endif %}INSERT INTO TABLE {{ params.reaction_table }}
PARTITION (experiment_id, period_end)
SELECT
    session_id
  , easy_id
  , custom_parameter['phxbanditpattern'] AS pattern_id
  , '{{ params.kpi_name }}' AS reaction_type
  , count(1) AS reaction_count
  , {{ params.experiment_id }} AS experiment_id
FROM rat_log.rat_log_normalized
WHERE time_stamp BETWEEN '{{ params.start_datetime }}' AND '{{ params.end_datetime }}'
  AND custom_parameter['phxexperiment'] = '{{ params.experiment_id }}'
  AND custom_parameter['phxbanditpattern'] IN ('default'{% for p in params.phxbanditpatterns %}, '{{ p }}'{% endfor %})
{% for kc in params.kpi_conditions -%}
{% if kc.condition_type == 'url' or kc.condition_type == 'conversion_url' %}AND (
{% for c in kc.conditions %}{% if not loop.first %}    OR {% endif %}{% if c.operator == 'equal' %}(domain = '{{ c.domain }}' AND path IN ({% for p in c.paths %}{% if not loop.first %}, {% endif %}'{{ p }}'{% endfor %})){% elif c.operator == 'starts_with' %}url LIKE '{{ c.urls | join("%' OR url LIKE '") }}%'{% elif c.operator == 'ends_with' %}url LIKE '%{{ c.urls | join("' OR url LIKE '%") }}'{% else %}url LIKE '%{{ c.urls | join("%' OR url LIKE '%") }}%'{% endif %}
{% endfor %})
{% elif kc.condition_type == 'custom_parameter' or kc.condition_type == 'conversion_custom_parameter' %}AND (
{% for c in kc.conditions %}{% if not loop.first %}    OR {% endif %}{% if c.operator == 'equal' %}{{ c.key }} = '{{ c.value }}'{% elif c.operator == 'starts_with' %}{{ c.key }} LIKE '{{ c.value }}%'{% elif c.operator == 'ends_with' %}{{ c.key }} LIKE '%{{ c.value }}'{% else %}{{ c.key }} LIKE '%{{ c.value }}%'{% endif %}
{% endfor %})
{% else %}AND (
page_type IN ('cart_checkout','sp_cart_checkout')
)
{% endif %}{% endfor %}GROUP BY session_id, easy_id, custom_parameter['phxbanditpattern']
;
"#;

pub const REACTION_R2D2_TEMPLATE: &str = r#"{% if params.settings %}SET mapred.job.name=generate_reaction_{{ params.experiment_id }};
USE {{ params.ghp_hive_dbname }};
CREATE TABLE IF NOT EXISTS {{ params.reaction_table }} (
session_id STRING,
reaction_type STRING
)
STORED AS RCFILE
;
{% endif %}INSERT INTO TABLE {{ params.reaction_table }}
SELECT
    session_id
  , '{{ params.kpi_name }}' AS reaction_type
FROM rat_log.rat_log_normalized
WHERE custom_parameter['phxexperiment'] = '{{ params.experiment_id }}'
  AND custom_parameter['phxbanditpattern'] IN ('default'{% for p in params.phxbanditpatterns %}, '{{ p }}'{% endfor %})
  AND parse_url(concat('https://rd.rakuten.co.jp',raw_request), 'QUERY','D2') IS NOT NULL
{% for kc in params.kpi_conditions %}{% for c in kc.conditions %}  AND parse_url(concat('https://rd.rakuten.co.jp',raw_request), 'QUERY','D2') = '{{ c.value }}'
{% endfor %}{% endfor %};
"#;

pub const REACTION_CTC_TEMPLATE: &str = r#"{% if params.settings %}USE {{ params.ghp_hive_dbname }};
{% endif %}INSERT INTO TABLE {{ params.reaction_table }}
SELECT '{{ params.kpi_name }}' AS reaction_type, steps.*
FROM
{% for group in params.kpi_conditions %}{% if group.kpi == 'conversion' %}LEFT OUTER JOIN {% elif not loop.first %}UNION ALL {% endif %}(SELECT session_id, '{{ group.kpi }}' AS step, {{ group.conditions | length }} AS condition_count FROM rat_log.rat_log_normalized) {{ group.kpi }}
{% endfor %};
"#;

pub const REPORT_TEMPLATE: &str = r#"SET mapred.job.name=generate_report_{{ params.experiment_id }};
USE {{ params.ghp_hive_dbname }};

CREATE TABLE IF NOT EXISTS {{ params.report_table }} (
  device_type STRING,
  variation_id INT,
  data MAP<STRING,MAP<STRING,BIGINT>>
)
PARTITIONED BY (
  experiment_id INT,
  period_end TIMESTAMP
)
STORED AS RCFILE
;
INSERT OVERWRITE TABLE {{ params.report_table }}
PARTITION (experiment_id, period_end)
SELECT
device_type,
CASE WHEN (pattern_id = 'default') THEN NULL
     ELSE split(pattern_id, '__')[1]
     END AS variation_id,
map({% for name in params.kpi_names %}'{{ name }}', map('session_based', count(DISTINCT CASE WHEN reaction_type='{{ name }}' THEN session_id ELSE NULL END)),
    {% endfor %}'impressions', map('overall', cast(SUM(page_visits)/{{ params.kpi_count }} as BIGINT))) AS data,
experiment_id,
period_end
FROM reaction_table
WHERE experiment_id = {{ params.experiment_id }}
AND pattern_id IN ('default'{% for p in params.phxbanditpatterns %}, '{{ p }}'{% endfor %})
GROUP BY device_type,
         pattern_id,
         experiment_id,
         period_end
;"#;
